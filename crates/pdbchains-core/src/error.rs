use thiserror::Error;

/// Failure to build a data module or data selector from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("`{0}` has no `_target_`")]
    MissingTarget(String),

    #[error("no {kind} registered for target `{target}`")]
    UnknownTarget { kind: &'static str, target: String },

    #[error("invalid `{path}` config")]
    InvalidConfig {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("`{0}` is not set")]
    MissingValue(String),

    #[error("invalid `{path}`: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("data module was built without a data selector")]
    MissingSelector,
}

impl BuildError {
    /// True when the configuration itself is at fault rather than the builder.
    pub fn is_config_error(&self) -> bool {
        !matches!(self, Self::MissingSelector)
    }
}
