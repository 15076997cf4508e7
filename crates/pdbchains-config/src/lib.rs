//! # pdbchains-config
//!
//! Environment settings and hierarchical YAML configuration for dataset builds.
//!
//! * [`Settings`] - an immutable snapshot of the process environment overlaid with a local
//!   `.env` file. Populated once at start-up and passed around explicitly.
//! * [`Composer`] - composes a configuration by name from a directory of YAML files,
//!   following `defaults` lists. `${...}` interpolations are resolved per key, when read.
//!
mod compose;
mod error;
mod interpolate;
mod settings;

pub use self::compose::{dataset_config_root, experiment_config_root, Composer};
pub use self::error::ConfigError;
pub use self::settings::{find_env_file, Settings};

use serde_yaml::Value;

/// Look up a dotted key path (`a.b.c`) in a composed document.
pub fn select<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |node, segment| node.get(segment))
}
