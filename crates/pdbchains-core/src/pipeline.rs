use crate::datamodule::DataModule;
use crate::table::{filter_by_ids, require_columns, string_column, write_manifest};
use crate::table::{CHAIN_COLUMN, PDB_COLUMN};
use anyhow::Result;
use log::info;
use std::path::PathBuf;

/// Outcome of a dataset build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetBuild {
    pub manifest: PathBuf,
    pub rows: usize,
}

/// Select, optionally restrict to `ids`, download, process and write the manifest.
///
/// The steps run in that order and the first failure aborts the rest.
pub fn build_dataset(datamodule: &DataModule, ids: Option<&[String]>) -> Result<DatasetBuild> {
    let dataselector = datamodule.dataselector();
    let mut df = dataselector.create_dataset()?;
    if let Some(ids) = ids {
        df = filter_by_ids(&df, ids)?;
        info!("{} chains remaining", df.height());
    }
    info!(
        "Dataset created with {} entries. Now downloading structure data...",
        df.height()
    );

    require_columns(&df, &[PDB_COLUMN, CHAIN_COLUMN])?;
    let pdbs = string_column(&df, PDB_COLUMN)?;
    let chains = string_column(&df, CHAIN_COLUMN)?;
    datamodule.download_structures(&pdbs)?;
    datamodule.process_structures(&pdbs, &chains)?;

    let file_identifier = datamodule.file_identifier();
    let manifest = dataselector
        .data_dir()
        .join(format!("{file_identifier}.csv"));
    info!("Saving dataset csv to {}", manifest.display());
    write_manifest(&mut df, &manifest)?;

    Ok(DatasetBuild {
        manifest,
        rows: df.height(),
    })
}
