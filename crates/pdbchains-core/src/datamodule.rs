//! The data module: owns a data selector and turns selected rows into raw and
//! processed structure files on disk.
use crate::featurize::{open_structure, ChainFeatures};
use crate::fetch::{join_url, write_atomic, Fetch};
use crate::selector::DataSelect;
use crate::BuildError;
use anyhow::{ensure, Context, Result};
use itertools::Itertools;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use strum::{Display, EnumString};

/// On-disk format of the raw structure files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StructureFormat {
    #[default]
    Cif,
    Pdb,
}

fn default_structure_url() -> String {
    "https://files.rcsb.org/download".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataModuleConfig {
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub format: StructureFormat,
    #[serde(default = "default_structure_url")]
    pub structure_url: String,
    #[serde(default)]
    pub overwrite: bool,
}

pub struct DataModule {
    data_dir: PathBuf,
    format: StructureFormat,
    structure_url: String,
    overwrite: bool,
    dataselector: Box<dyn DataSelect>,
    fetcher: Rc<dyn Fetch>,
}

impl std::fmt::Debug for DataModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataModule")
            .field("data_dir", &self.data_dir)
            .field("format", &self.format)
            .field("structure_url", &self.structure_url)
            .field("overwrite", &self.overwrite)
            .field("dataselector", &self.dataselector.data_dir())
            .finish()
    }
}

impl DataModule {
    /// A data module is only valid with a selector; `None` is reported as
    /// [`BuildError::MissingSelector`].
    pub fn new(
        data_dir: PathBuf,
        config: DataModuleConfig,
        dataselector: Option<Box<dyn DataSelect>>,
        fetcher: Rc<dyn Fetch>,
    ) -> Result<Self, BuildError> {
        let dataselector = dataselector.ok_or(BuildError::MissingSelector)?;
        Ok(Self {
            data_dir,
            format: config.format,
            structure_url: config.structure_url,
            overwrite: config.overwrite,
            dataselector,
            fetcher,
        })
    }

    pub fn dataselector(&self) -> &dyn DataSelect {
        self.dataselector.as_ref()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn format(&self) -> StructureFormat {
        self.format
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn raw_path(&self, pdb: &str) -> PathBuf {
        self.raw_dir().join(format!("{pdb}.{}", self.format))
    }

    pub fn processed_path(&self, pdb: &str, chain: &str) -> PathBuf {
        self.processed_dir()
            .join(format!("{pdb}_{chain}.safetensors"))
    }

    /// Download `{structure_url}/{pdb}.{format}` for each distinct id into `raw/`.
    pub fn download_structures(&self, pdbs: &[String]) -> Result<()> {
        let raw_dir = self.raw_dir();
        std::fs::create_dir_all(&raw_dir)
            .with_context(|| format!("failed to create {}", raw_dir.display()))?;

        let (mut downloaded, mut skipped) = (0usize, 0usize);
        for pdb in pdbs.iter().unique() {
            let path = self.raw_path(pdb);
            if path.exists() && !self.overwrite {
                debug!("{} exists, skipping", path.display());
                skipped += 1;
                continue;
            }
            let url = join_url(&self.structure_url, &format!("{pdb}.{}", self.format));
            debug!("Downloading {url}");
            let bytes = self.fetcher.fetch(&url)?;
            write_atomic(&path, &bytes)?;
            downloaded += 1;
        }
        info!("Downloaded {downloaded} structures, {skipped} already present");
        Ok(())
    }

    /// Featurize each (pdb, chain) pair into `processed/{pdb}_{chain}.safetensors`.
    pub fn process_structures(&self, pdbs: &[String], chains: &[String]) -> Result<()> {
        ensure!(
            pdbs.len() == chains.len(),
            "got {} pdb ids but {} chain ids",
            pdbs.len(),
            chains.len()
        );
        let processed_dir = self.processed_dir();
        std::fs::create_dir_all(&processed_dir)
            .with_context(|| format!("failed to create {}", processed_dir.display()))?;

        let (mut processed, mut skipped) = (0usize, 0usize);
        for (pdb, rows) in &pdbs.iter().zip(chains).chunk_by(|(pdb, _)| *pdb) {
            let todo: Vec<&String> = rows
                .map(|(_, chain)| chain)
                .filter(|chain| {
                    let exists = self.processed_path(pdb, chain).exists() && !self.overwrite;
                    if exists {
                        skipped += 1;
                    }
                    !exists
                })
                .collect();
            if todo.is_empty() {
                continue;
            }
            let raw = self.raw_path(pdb);
            let structure = open_structure(&raw)?;
            for chain in todo {
                let path = self.processed_path(pdb, chain);
                debug!("Processing {pdb} chain {chain}");
                ChainFeatures::from_structure(&structure, chain)
                    .with_context(|| format!("failed to process {}", raw.display()))?
                    .save_to_safetensor(&path)?;
                processed += 1;
            }
        }
        info!("Processed {processed} chains, {skipped} already present");
        Ok(())
    }

    pub fn file_identifier(&self) -> String {
        self.dataselector.file_identifier()
    }
}
