use anyhow::{anyhow, Context, Result};
use log::info;
use pdbchains_config::{dataset_config_root, experiment_config_root, Composer, Settings};
use pdbchains_core::{build_dataset, read_id_list, BuildContext, Registry};
use serde_yaml::Value;
use std::path::Path;

pub fn execute(
    config_dir: &Path,
    config_name: &str,
    pid_list_file: Option<&str>,
    env_file: &Path,
) -> Result<()> {
    let settings = Settings::load(env_file)?;
    let composer = Composer::new(&settings);

    // only the keys read below are resolved; the rest may carry interpolations
    // meant for other tools
    let exp_cfg = composer
        .compose(experiment_config_root(config_dir), config_name)
        .context("failed to compose experiment config")?;
    info!("Exp config:\n{}", serde_yaml::to_string(&exp_cfg)?);

    let dataset = composer
        .resolve(&exp_cfg, "dataset")?
        .and_then(|value| value.as_str().map(str::to_string))
        .ok_or_else(|| anyhow!("experiment config `{config_name}` has no `dataset`"))?;
    let subdir = composer.resolve(&exp_cfg, "dataset_config_subdir")?;
    let data_cfg = composer
        .compose(dataset_config_root(config_dir, subdir.as_ref())?, &dataset)
        .context("failed to compose dataset config")?;
    info!("Data config:\n{}", serde_yaml::to_string(&data_cfg)?);

    let datamodule_cfg = composer
        .resolve(&data_cfg, "datamodule")?
        .filter(|cfg| !matches!(cfg, Value::Null))
        .ok_or_else(|| anyhow!("dataset config `{dataset}` has no `datamodule`"))?;
    let ctx = BuildContext::new(&settings);
    let datamodule = Registry::default().build_datamodule(&datamodule_cfg, &ctx)?;

    let ids = pid_list_file.map(read_id_list).transpose()?;
    let build = build_dataset(&datamodule, ids.as_deref())?;
    info!("Wrote {} rows to {}", build.rows, build.manifest.display());
    Ok(())
}
