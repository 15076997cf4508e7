//! Building data modules and data selectors from composed configuration.
//!
//! Every buildable mapping names its builder under `_target_`. The [`Registry`]
//! maps those tags to factory functions; nested mappings (the data module's
//! `dataselector`) are built through the same registry.
//!
//! ```yaml
//! datamodule:
//!   _target_: pdb_datamodule
//!   format: cif
//!   dataselector:
//!     _target_: pdb_dataselector
//!     data_dir: /data/pdb_train
//!     min_length: 50
//! ```
use crate::datamodule::{DataModule, DataModuleConfig};
use crate::fetch::{Fetch, UrlFetcher};
use crate::selector::{DataSelect, PdbSelector, PdbSelectorConfig};
use crate::BuildError;
use log::debug;
use pdbchains_config::Settings;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

pub const TARGET_KEY: &str = "_target_";
pub const DATASELECTOR_KEY: &str = "dataselector";

/// What factories get to see besides their own mapping.
#[derive(Clone)]
pub struct BuildContext<'a> {
    pub settings: &'a Settings,
    pub fetcher: Rc<dyn Fetch>,
}

impl<'a> BuildContext<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self::with_fetcher(settings, Rc::new(UrlFetcher::new()))
    }

    pub fn with_fetcher(settings: &'a Settings, fetcher: Rc<dyn Fetch>) -> Self {
        Self { settings, fetcher }
    }
}

pub type SelectorFactory =
    fn(&Value, &Registry, &BuildContext<'_>) -> Result<Box<dyn DataSelect>, BuildError>;
pub type DataModuleFactory =
    fn(&Value, &Registry, &BuildContext<'_>) -> Result<DataModule, BuildError>;

pub struct Registry {
    selectors: HashMap<String, SelectorFactory>,
    datamodules: HashMap<String, DataModuleFactory>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_datamodule("pdb_datamodule", pdb_datamodule);
        registry.register_selector("pdb_dataselector", pdb_dataselector);
        registry
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            selectors: HashMap::new(),
            datamodules: HashMap::new(),
        }
    }

    pub fn register_selector(&mut self, target: &str, factory: SelectorFactory) {
        self.selectors.insert(target.to_string(), factory);
    }

    pub fn register_datamodule(&mut self, target: &str, factory: DataModuleFactory) {
        self.datamodules.insert(target.to_string(), factory);
    }

    pub fn build_datamodule(
        &self,
        config: &Value,
        ctx: &BuildContext<'_>,
    ) -> Result<DataModule, BuildError> {
        let target = target_of(config, "datamodule")?;
        let factory = self
            .datamodules
            .get(target)
            .ok_or_else(|| BuildError::UnknownTarget {
                kind: "datamodule",
                target: target.to_string(),
            })?;
        debug!("Building datamodule `{target}`");
        factory(config, self, ctx)
    }

    pub fn build_selector(
        &self,
        config: &Value,
        ctx: &BuildContext<'_>,
    ) -> Result<Box<dyn DataSelect>, BuildError> {
        let target = target_of(config, DATASELECTOR_KEY)?;
        let factory = self
            .selectors
            .get(target)
            .ok_or_else(|| BuildError::UnknownTarget {
                kind: "dataselector",
                target: target.to_string(),
            })?;
        debug!("Building dataselector `{target}`");
        factory(config, self, ctx)
    }
}

fn target_of<'v>(config: &'v Value, path: &str) -> Result<&'v str, BuildError> {
    config
        .get(TARGET_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| BuildError::MissingTarget(path.to_string()))
}

fn parse<T: DeserializeOwned>(config: &Value, path: &str) -> Result<T, BuildError> {
    serde_yaml::from_value(config.clone()).map_err(|source| BuildError::InvalidConfig {
        path: path.to_string(),
        source,
    })
}

fn pdb_dataselector(
    config: &Value,
    _registry: &Registry,
    ctx: &BuildContext<'_>,
) -> Result<Box<dyn DataSelect>, BuildError> {
    let config: PdbSelectorConfig = parse(config, DATASELECTOR_KEY)?;
    Ok(Box::new(PdbSelector::new(config, ctx.fetcher.clone())?))
}

fn pdb_datamodule(
    config: &Value,
    registry: &Registry,
    ctx: &BuildContext<'_>,
) -> Result<DataModule, BuildError> {
    let module_config: DataModuleConfig = parse(config, "datamodule")?;
    let data_dir = match &module_config.data_dir {
        Some(dir) => dir.clone(),
        None => ctx
            .settings
            .get("DATA_PATH")
            .map(|root| PathBuf::from(root).join("pdb_train"))
            .ok_or_else(|| BuildError::MissingValue("datamodule.data_dir".to_string()))?,
    };
    let dataselector = match config.get(DATASELECTOR_KEY) {
        None | Some(Value::Null) => None,
        Some(selector) => Some(registry.build_selector(selector, ctx)?),
    };
    DataModule::new(data_dir, module_config, dataselector, ctx.fetcher.clone())
}
