use crate::ConfigError;
use log::debug;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variables visible to configuration and builders.
///
/// Built once from the process environment with an optional `.env` file layered
/// underneath it: a variable already set in the process wins over the file. The
/// process environment itself is never modified.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    vars: BTreeMap<String, String>,
}

impl Settings {
    /// Process environment plus `env_file`, if it exists.
    ///
    /// A bare file name is looked up in the working directory and then in each of
    /// its parents; the first match wins.
    pub fn load(env_file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let env_file = env_file.as_ref();
        let env_file = std::env::current_dir()
            .ok()
            .and_then(|cwd| find_env_file(&cwd, env_file))
            .unwrap_or_else(|| env_file.to_path_buf());
        let mut settings = Self::from_env_file(env_file)?;
        settings.overlay(std::env::vars_os());
        Ok(settings)
    }

    /// Layer `vars` over the current values. Pairs that are not valid UTF-8 are
    /// skipped.
    fn overlay(&mut self, vars: impl IntoIterator<Item = (OsString, OsString)>) {
        for (key, value) in vars {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => {
                    self.vars.insert(key, value);
                }
                (key, _) => debug!("Skipping non UTF-8 environment variable {key:?}"),
            }
        }
    }

    /// Only the contents of `env_file`. A missing file yields empty settings.
    pub fn from_env_file(env_file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = env_file.as_ref();
        if !path.is_file() {
            debug!("No environment file at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let vars = parse_env_file(&content).map_err(|(line, reason)| ConfigError::EnvFile {
            path: path.to_path_buf(),
            line,
            reason,
        })?;
        debug!("Loaded {} variables from {}", vars.len(), path.display());
        Ok(Self {
            vars: vars.into_iter().collect(),
        })
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Find `name` in `start` or the closest parent directory holding it.
///
/// Paths with a directory part (`conf/.env`, `/etc/app.env`) are not searched for.
pub fn find_env_file(start: &Path, name: &Path) -> Option<PathBuf> {
    if name.is_absolute() || name.components().count() != 1 {
        return None;
    }
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Parse dotenv-style content. Errors carry the 1-based line number.
fn parse_env_file(content: &str) -> Result<Vec<(String, String)>, (usize, String)> {
    let mut vars = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| (line_no, "expected KEY=VALUE".to_string()))?;
        let key = key.trim();
        let valid_key = !key.is_empty()
            && !key.starts_with(|c: char| c.is_ascii_digit())
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid_key {
            return Err((line_no, format!("invalid variable name `{key}`")));
        }
        let value = parse_value(value.trim()).map_err(|reason| (line_no, reason))?;
        vars.push((key.to_string(), value));
    }
    Ok(vars)
}

fn parse_value(value: &str) -> Result<String, String> {
    if let Some(rest) = value.strip_prefix('"') {
        let end = closing_quote(rest, '"').ok_or("unterminated double quote")?;
        let mut out = String::with_capacity(end);
        let mut chars = rest[..end].chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        Ok(out)
    } else if let Some(rest) = value.strip_prefix('\'') {
        let end = rest.find('\'').ok_or("unterminated single quote")?;
        Ok(rest[..end].to_string())
    } else {
        let value = match value.find(" #") {
            Some(pos) => &value[..pos],
            None => value,
        };
        Ok(value.trim().to_string())
    }
}

// Index of the first unescaped `quote` in `s`.
fn closing_quote(s: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            c if c == quote && !escaped => return Some(i),
            _ => escaped = false,
        }
    }
    None
}
