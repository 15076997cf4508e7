use crate::interpolate;
use crate::{ConfigError, Settings};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Directory holding the experiment configurations under `base`.
pub fn experiment_config_root(base: &Path) -> PathBuf {
    base.join("experiment_config")
}

/// Directory holding the dataset configuration an experiment refers to.
///
/// `{base}/datasets_config/{dataset_config_subdir}` when the experiment names a
/// subdirectory, `{base}/datasets_config/` otherwise. `subdir` is the resolved
/// `dataset_config_subdir` value; anything but a scalar is rejected.
pub fn dataset_config_root(base: &Path, subdir: Option<&Value>) -> Result<PathBuf, ConfigError> {
    let subdir = match subdir {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                key: "dataset_config_subdir".to_string(),
                reason: format!("expected a directory name, got {other:?}"),
            })
        }
    };
    Ok(match subdir {
        Some(subdir) => base.join("datasets_config").join(subdir),
        None => base.join("datasets_config/"),
    })
}

/// Composes named YAML configurations from a config root.
///
/// A config file may start with a `defaults` list:
///
/// ```yaml
/// defaults:
///   - base_training          # {root}/base_training.yaml merged at the top level
///   - model: ca_transformer  # {root}/model/ca_transformer.yaml merged under `model`
///   - _self_                 # this file's own keys
/// ```
///
/// Later entries override earlier ones. The composed document keeps its `${...}`
/// interpolations; [`Composer::resolve`] resolves the keys a caller actually reads.
pub struct Composer<'a> {
    settings: &'a Settings,
}

impl<'a> Composer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    pub fn compose(&self, root: impl AsRef<Path>, name: &str) -> Result<Value, ConfigError> {
        self.compose_file(root.as_ref(), name, &mut Vec::new())
    }

    /// Resolved value at the dotted key `path` of a composed document, `None` when
    /// the key is absent.
    pub fn resolve(&self, doc: &Value, path: &str) -> Result<Option<Value>, ConfigError> {
        interpolate::resolve_path(doc, path, self.settings)
    }

    fn compose_file(
        &self,
        root: &Path,
        name: &str,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Value, ConfigError> {
        let path = config_path(root, name);
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                name: name.to_string(),
                root: root.to_path_buf(),
            });
        }
        if stack.contains(&path) {
            return Err(ConfigError::InvalidDefaults {
                path,
                reason: "config includes itself".to_string(),
            });
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let own: Value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        let mut own = match own {
            Value::Null => Mapping::new(),
            Value::Mapping(m) => m,
            _ => {
                return Err(ConfigError::InvalidDefaults {
                    path,
                    reason: "top level must be a mapping".to_string(),
                })
            }
        };
        let defaults = match own.remove("defaults") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(entries)) => entries,
            Some(_) => {
                return Err(ConfigError::InvalidDefaults {
                    path,
                    reason: "`defaults` must be a list".to_string(),
                })
            }
        };

        stack.push(path.clone());
        let mut merged = Value::Mapping(Mapping::new());
        let mut own = Some(Value::Mapping(own));
        for entry in defaults {
            match entry {
                Value::String(s) if s == "_self_" => {
                    if let Some(own) = own.take() {
                        merge(&mut merged, own);
                    }
                }
                Value::String(s) => {
                    let included = self.compose_file(root, &s, stack)?;
                    merge(&mut merged, included);
                }
                Value::Mapping(m) if m.len() == 1 => {
                    let Some((group, option)) = m.into_iter().next() else {
                        continue;
                    };
                    let Some(group) = group.as_str() else {
                        return Err(ConfigError::InvalidDefaults {
                            path,
                            reason: "group names must be strings".to_string(),
                        });
                    };
                    let group = group.strip_prefix("override ").unwrap_or(group).trim();
                    let option = match option {
                        Value::Null => continue,
                        Value::String(option) => option,
                        _ => {
                            return Err(ConfigError::InvalidDefaults {
                                path,
                                reason: format!("option for group `{group}` must be a string"),
                            })
                        }
                    };
                    let included = self.compose_file(&root.join(group), &option, stack)?;
                    merge(&mut merged, nest(group, included));
                }
                other => {
                    return Err(ConfigError::InvalidDefaults {
                        path,
                        reason: format!("unsupported entry {other:?}"),
                    })
                }
            }
        }
        if let Some(own) = own {
            merge(&mut merged, own);
        }
        stack.pop();
        Ok(merged)
    }
}

fn config_path(root: &Path, name: &str) -> PathBuf {
    if name.ends_with(".yaml") || name.ends_with(".yml") {
        root.join(name)
    } else {
        root.join(format!("{name}.yaml"))
    }
}

// `a/b` + value -> {a: {b: value}}
fn nest(group: &str, value: Value) -> Value {
    group
        .split('/')
        .filter(|s| !s.is_empty())
        .rev()
        .fold(value, |inner, key| {
            let mut m = Mapping::new();
            m.insert(Value::String(key.to_string()), inner);
            Value::Mapping(m)
        })
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_mapping() && value.is_mapping() => {
                        merge(existing, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
