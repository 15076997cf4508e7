//! `${...}` interpolation over a composed document.
//!
//! * `${oc.env:VAR}` / `${oc.env:VAR,default}` read from [`Settings`].
//! * `${a.b.c}` copies the value at that key path of the document.
//!
//! A string made of a single interpolation takes the type of the value it points at;
//! mixed strings are rendered to text.
//!
//! Resolution is per key path: only the requested subtree, and whatever it refers
//! to, is resolved. Other keys may hold interpolations that cannot be resolved here
//! (`${hydra:runtime.cwd}`, variables of other tools) without affecting the result.
use crate::{select, ConfigError, Settings};
use serde_yaml::Value;

/// Resolved copy of the value at `path` (`""` is the whole document), or `None`
/// when there is no such key.
pub(crate) fn resolve_path(
    doc: &Value,
    path: &str,
    settings: &Settings,
) -> Result<Option<Value>, ConfigError> {
    let Some(node) = select(doc, path) else {
        return Ok(None);
    };
    let mut node = node.clone();
    resolve_node(&mut node, doc, settings, &mut Vec::new())?;
    Ok(Some(node))
}

enum Part {
    Text(String),
    Expr(String),
}

fn resolve_node(
    node: &mut Value,
    root: &Value,
    settings: &Settings,
    stack: &mut Vec<String>,
) -> Result<(), ConfigError> {
    match node {
        Value::String(s) if s.contains("${") => {
            *node = resolve_string(s, root, settings, stack)?;
        }
        Value::Mapping(m) => {
            for (_, value) in m.iter_mut() {
                resolve_node(value, root, settings, stack)?;
            }
        }
        Value::Sequence(seq) => {
            for value in seq.iter_mut() {
                resolve_node(value, root, settings, stack)?;
            }
        }
        Value::Tagged(tagged) => resolve_node(&mut tagged.value, root, settings, stack)?,
        _ => {}
    }
    Ok(())
}

fn resolve_string(
    s: &str,
    root: &Value,
    settings: &Settings,
    stack: &mut Vec<String>,
) -> Result<Value, ConfigError> {
    let parts = split(s);
    if let [Part::Expr(expr)] = parts.as_slice() {
        return resolve_expr(expr, root, settings, stack);
    }
    let mut out = String::new();
    for part in parts {
        match part {
            Part::Text(text) => out.push_str(&text),
            Part::Expr(expr) => out.push_str(&render(&resolve_expr(&expr, root, settings, stack)?)),
        }
    }
    Ok(Value::String(out))
}

fn resolve_expr(
    expr: &str,
    root: &Value,
    settings: &Settings,
    stack: &mut Vec<String>,
) -> Result<Value, ConfigError> {
    // nested interpolation inside the expression, e.g. a default
    let expr = if expr.contains("${") {
        render(&resolve_string(expr, root, settings, stack)?)
    } else {
        expr.to_string()
    };
    let expr = expr.trim();

    if let Some(rest) = expr.strip_prefix("oc.env:") {
        let (var, default) = match rest.split_once(',') {
            Some((var, default)) => (var.trim(), Some(unquote(default.trim()))),
            None => (rest.trim(), None),
        };
        return match (settings.get(var), default) {
            (Some(value), _) => Ok(Value::String(value.to_string())),
            (None, Some("null")) => Ok(Value::Null),
            (None, Some(default)) => Ok(Value::String(default.to_string())),
            (None, None) => Err(ConfigError::MissingEnv(var.to_string())),
        };
    }

    if stack.iter().any(|seen| seen == expr) {
        return Err(ConfigError::InterpolationCycle(expr.to_string()));
    }
    let mut target = select(root, expr)
        .cloned()
        .ok_or_else(|| ConfigError::UnresolvedReference(expr.to_string()))?;
    stack.push(expr.to_string());
    resolve_node(&mut target, root, settings, stack)?;
    stack.pop();
    Ok(target)
}

fn split(s: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = matching_brace(&rest[start + 2..]) else {
            break;
        };
        if start > 0 {
            parts.push(Part::Text(rest[..start].to_string()));
        }
        parts.push(Part::Expr(rest[start + 2..start + 2 + len].to_string()));
        rest = &rest[start + 2 + len + 1..];
    }
    if !rest.is_empty() {
        parts.push(Part::Text(rest.to_string()));
    }
    parts
}

// Length of the expression up to the `}` closing an already opened `${`.
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 1;
            }
            b'}' if depth == 0 => return Some(i),
            b'}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(s)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
