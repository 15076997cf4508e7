use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot find config `{name}` in {root}")]
    NotFound { name: String, root: PathBuf },

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid defaults list in {path}: {reason}")]
    InvalidDefaults { path: PathBuf, reason: String },

    #[error("invalid `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("environment variable `{0}` is not set")]
    MissingEnv(String),

    #[error("interpolation `${{{0}}}` does not resolve to a key")]
    UnresolvedReference(String),

    #[error("interpolation cycle while resolving `${{{0}}}`")]
    InterpolationCycle(String),

    #[error("{path}:{line}: {reason}")]
    EnvFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}
