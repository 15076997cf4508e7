//! Data selection: which (pdb, chain) pairs make up a dataset.
mod derived;

pub use self::derived::{parse_entry_types, parse_resolutions, parse_seqres, SeqresRecord};

use crate::fetch::{join_url, write_atomic, Fetch};
use crate::residue::is_canonical_sequence;
use crate::BuildError;
use anyhow::{Context, Result};
use log::{debug, info};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const SEQRES_FILE: &str = "pdb_seqres.txt";
pub const ENTRY_TYPE_FILE: &str = "pdb_entry_type.txt";
pub const RESOLUTION_FILE: &str = "resolu.idx";

/// Produces the working dataset table and owns the directory it is written to.
pub trait DataSelect {
    /// Build the table. Must contain at least the `pdb` and `chain` columns.
    fn create_dataset(&self) -> Result<DataFrame>;

    fn data_dir(&self) -> &Path;

    /// Canonical name of the dataset, used to name the manifest.
    fn file_identifier(&self) -> String;
}

fn default_metadata_url() -> String {
    "https://files.wwpdb.org/pub/pdb/derived_data".to_string()
}

fn default_fraction() -> f64 {
    1.0
}

fn default_molecule_type() -> Option<String> {
    Some("protein".to_string())
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, Deserialize)]
pub struct PdbSelectorConfig {
    pub data_dir: PathBuf,
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_fraction")]
    pub fraction: f64,
    #[serde(default = "default_molecule_type")]
    pub molecule_type: Option<String>,
    #[serde(default)]
    pub experiment_types: Option<Vec<String>>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub oligomeric_min: Option<u32>,
    pub oligomeric_max: Option<u32>,
    pub best_resolution: Option<f64>,
    pub worst_resolution: Option<f64>,
    #[serde(default = "default_true")]
    pub remove_non_standard_residues: bool,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// A chain that survived selection, with the annotations joined in from the
/// entry-type and resolution indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRow {
    pub record: SeqresRecord,
    pub experiment_type: Option<String>,
    pub resolution: Option<f64>,
    pub oligomeric_count: u32,
}

/// Selects PDB chains from the wwPDB derived-data files.
pub struct PdbSelector {
    config: PdbSelectorConfig,
    fetcher: Rc<dyn Fetch>,
}

impl PdbSelector {
    pub fn new(config: PdbSelectorConfig, fetcher: Rc<dyn Fetch>) -> Result<Self, BuildError> {
        if !(config.fraction > 0.0 && config.fraction <= 1.0) {
            return Err(BuildError::InvalidValue {
                path: "dataselector.fraction".to_string(),
                reason: format!("{} is not in (0, 1]", config.fraction),
            });
        }
        if let (Some(min), Some(max)) = (config.min_length, config.max_length) {
            if min > max {
                return Err(BuildError::InvalidValue {
                    path: "dataselector.min_length".to_string(),
                    reason: format!("{min} is larger than max_length {max}"),
                });
            }
        }
        if let (Some(best), Some(worst)) = (config.best_resolution, config.worst_resolution) {
            if best > worst {
                return Err(BuildError::InvalidValue {
                    path: "dataselector.best_resolution".to_string(),
                    reason: format!("{best} is larger than worst_resolution {worst}"),
                });
            }
        }
        Ok(Self { config, fetcher })
    }

    pub fn config(&self) -> &PdbSelectorConfig {
        &self.config
    }

    /// Local copy of a derived-data file, downloaded when missing.
    fn metadata_file(&self, remote: &str, local: &str) -> Result<String> {
        let path = self.config.data_dir.join(local);
        if path.exists() && !self.config.overwrite {
            debug!("Using cached {}", path.display());
        } else {
            let url = join_url(&self.config.metadata_url, remote);
            info!("Downloading {url}");
            let bytes = self.fetcher.fetch(&url)?;
            std::fs::create_dir_all(&self.config.data_dir).with_context(|| {
                format!("failed to create {}", self.config.data_dir.display())
            })?;
            write_atomic(&path, &bytes)?;
        }
        std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    /// Apply the configured filters to the seqres records, in order.
    pub fn select(
        &self,
        records: Vec<SeqresRecord>,
        entry_types: &HashMap<String, String>,
        resolutions: &HashMap<String, f64>,
    ) -> Vec<ChainRow> {
        let c = &self.config;
        let mut chains_per_entry: HashMap<&str, u32> = HashMap::new();
        for record in &records {
            *chains_per_entry.entry(record.pdb.as_str()).or_default() += 1;
        }
        let experiment_types: Option<HashSet<String>> = c
            .experiment_types
            .as_ref()
            .filter(|types| !types.is_empty())
            .map(|types| types.iter().map(|t| t.to_lowercase()).collect());
        let excluded: HashSet<String> = c.exclude_ids.iter().map(|id| id.to_lowercase()).collect();
        let bound_resolution = c.best_resolution.is_some() || c.worst_resolution.is_some();

        let rows: Vec<ChainRow> = records
            .iter()
            .map(|record| ChainRow {
                record: record.clone(),
                experiment_type: entry_types.get(&record.pdb).cloned(),
                resolution: resolutions.get(&record.pdb).copied(),
                oligomeric_count: chains_per_entry[record.pdb.as_str()],
            })
            .filter(|row| match &c.molecule_type {
                Some(mt) => &row.record.molecule_type == mt,
                None => true,
            })
            .filter(|row| match &experiment_types {
                Some(types) => row
                    .experiment_type
                    .as_ref()
                    .is_some_and(|t| types.contains(&t.to_lowercase())),
                None => true,
            })
            .filter(|row| {
                c.min_length.map_or(true, |min| row.record.length >= min)
                    && c.max_length.map_or(true, |max| row.record.length <= max)
            })
            .filter(|row| {
                c.oligomeric_min.map_or(true, |min| row.oligomeric_count >= min)
                    && c.oligomeric_max.map_or(true, |max| row.oligomeric_count <= max)
            })
            .filter(|row| {
                if !bound_resolution {
                    return true;
                }
                row.resolution.is_some_and(|r| {
                    c.best_resolution.map_or(true, |best| r >= best)
                        && c.worst_resolution.map_or(true, |worst| r <= worst)
                })
            })
            .filter(|row| {
                !c.remove_non_standard_residues || is_canonical_sequence(&row.record.sequence)
            })
            .filter(|row| !excluded.contains(&row.record.pdb))
            .collect();

        if c.fraction >= 1.0 {
            return rows;
        }
        let keep = (rows.len() as f64 * c.fraction).round() as usize;
        let mut rng = StdRng::seed_from_u64(c.seed);
        let mut picked = rand::seq::index::sample(&mut rng, rows.len(), keep).into_vec();
        picked.sort_unstable();
        let picked: HashSet<usize> = picked.into_iter().collect();
        rows.into_iter()
            .enumerate()
            .filter(|(idx, _)| picked.contains(idx))
            .map(|(_, row)| row)
            .collect()
    }
}

/// Rows -> table with the columns
/// `pdb, chain, id, molecule_type, length, name, sequence, experiment_type, resolution, oligomeric_count`.
pub fn rows_to_frame(rows: &[ChainRow]) -> PolarsResult<DataFrame> {
    let pdb: Vec<&str> = rows.iter().map(|r| r.record.pdb.as_str()).collect();
    let chain: Vec<&str> = rows.iter().map(|r| r.record.chain.as_str()).collect();
    let id: Vec<String> = rows.iter().map(|r| r.record.id()).collect();
    let molecule_type: Vec<&str> = rows.iter().map(|r| r.record.molecule_type.as_str()).collect();
    let length: Vec<i64> = rows.iter().map(|r| r.record.length as i64).collect();
    let name: Vec<&str> = rows.iter().map(|r| r.record.name.as_str()).collect();
    let sequence: Vec<&str> = rows.iter().map(|r| r.record.sequence.as_str()).collect();
    let experiment_type: Vec<Option<&str>> =
        rows.iter().map(|r| r.experiment_type.as_deref()).collect();
    let resolution: Vec<Option<f64>> = rows.iter().map(|r| r.resolution).collect();
    let oligomeric_count: Vec<i64> = rows.iter().map(|r| r.oligomeric_count as i64).collect();

    df!(
        "pdb" => pdb,
        "chain" => chain,
        "id" => id,
        "molecule_type" => molecule_type,
        "length" => length,
        "name" => name,
        "sequence" => sequence,
        "experiment_type" => experiment_type,
        "resolution" => resolution,
        "oligomeric_count" => oligomeric_count
    )
}

fn py_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}

fn py_float(value: f64) -> String {
    format!("{value:?}")
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

impl DataSelect for PdbSelector {
    fn create_dataset(&self) -> Result<DataFrame> {
        let seqres = parse_seqres(&self.metadata_file(SEQRES_FILE, SEQRES_FILE)?)?;
        let entry_types = parse_entry_types(&self.metadata_file(ENTRY_TYPE_FILE, ENTRY_TYPE_FILE)?);
        let resolutions = parse_resolutions(
            &self.metadata_file(&format!("index/{RESOLUTION_FILE}"), RESOLUTION_FILE)?,
        );
        let total = seqres.len();
        let rows = self.select(seqres, &entry_types, &resolutions);
        info!("Selected {} of {} chains", rows.len(), total);
        Ok(rows_to_frame(&rows)?)
    }

    fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn file_identifier(&self) -> String {
        let c = &self.config;
        format!(
            "df_pdb_f{}_minl{}_maxl{}_mt{}_et{}_mino{}_maxo{}_minr{}_maxr{}_rnsr{}",
            py_float(c.fraction),
            py_opt(c.min_length),
            py_opt(c.max_length),
            py_opt(c.molecule_type.as_deref()),
            c.experiment_types
                .as_ref()
                .map_or_else(|| "None".to_string(), |types| types.join("")),
            py_opt(c.oligomeric_min),
            py_opt(c.oligomeric_max),
            py_opt(c.best_resolution.map(py_float)),
            py_opt(c.worst_resolution.map(py_float)),
            py_bool(c.remove_non_standard_residues),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::UrlFetcher;
    use crate::table::{string_column, PDB_COLUMN};
    use pdbchains_test_data::TestMirror;

    fn selector(mirror: &TestMirror, data_dir: &Path, extra: &str) -> PdbSelector {
        let yaml = format!(
            "data_dir: {}\nmetadata_url: {}\n{extra}",
            data_dir.display(),
            mirror.url()
        );
        let config: PdbSelectorConfig = serde_yaml::from_str(&yaml).unwrap();
        PdbSelector::new(config, Rc::new(UrlFetcher::new())).unwrap()
    }

    fn ids(df: &DataFrame) -> Vec<String> {
        string_column(df, "id").unwrap()
    }

    #[test]
    fn test_default_selection() {
        let mirror = TestMirror::create().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let selector = selector(&mirror, data_dir.path(), "");
        let df = selector.create_dataset().unwrap();

        // protein chains with canonical sequences; the NA chain and 4unk are dropped
        assert_eq!(ids(&df), vec!["1abc_A", "1abc_B", "2xyz_A", "3pqr_A"]);
        assert_eq!(df.width(), 10);
        assert_eq!(
            string_column(&df, PDB_COLUMN).unwrap(),
            vec!["1abc", "1abc", "2xyz", "3pqr"]
        );
        // metadata is cached in the data directory
        assert!(data_dir.path().join(SEQRES_FILE).exists());
        assert!(data_dir.path().join(RESOLUTION_FILE).exists());
    }

    #[test]
    fn test_filters() {
        let mirror = TestMirror::create().unwrap();
        let data_dir = tempfile::tempdir().unwrap();

        let by_length = selector(&mirror, data_dir.path(), "min_length: 4\n");
        assert_eq!(ids(&by_length.create_dataset().unwrap()), vec!["1abc_B", "3pqr_A"]);

        let by_experiment = selector(&mirror, data_dir.path(), "experiment_types: [em, NMR]\n");
        assert_eq!(ids(&by_experiment.create_dataset().unwrap()), vec!["2xyz_A", "3pqr_A"]);

        let by_resolution = selector(&mirror, data_dir.path(), "worst_resolution: 2.0\n");
        assert_eq!(ids(&by_resolution.create_dataset().unwrap()), vec!["1abc_A", "1abc_B"]);

        let monomers = selector(&mirror, data_dir.path(), "oligomeric_max: 1\n");
        assert_eq!(ids(&monomers.create_dataset().unwrap()), vec!["3pqr_A"]);

        let keep_all = selector(
            &mirror,
            data_dir.path(),
            "molecule_type: null\nremove_non_standard_residues: false\nexclude_ids: [1ABC]\n",
        );
        assert_eq!(
            ids(&keep_all.create_dataset().unwrap()),
            vec!["2xyz_A", "2xyz_B", "3pqr_A", "4unk_A"]
        );
    }

    #[test]
    fn test_fraction_is_seeded_and_ordered() {
        let mirror = TestMirror::create().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let half = selector(&mirror, data_dir.path(), "fraction: 0.5\nseed: 7\n");
        let first = ids(&half.create_dataset().unwrap());
        let second = ids(&half.create_dataset().unwrap());
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);
    }

    #[test]
    fn test_invalid_config() {
        let config: PdbSelectorConfig =
            serde_yaml::from_str("data_dir: /tmp/x\nfraction: 1.5\n").unwrap();
        let err = PdbSelector::new(config, Rc::new(UrlFetcher::new())).err().unwrap();
        assert!(matches!(err, BuildError::InvalidValue { .. }));

        let config: PdbSelectorConfig =
            serde_yaml::from_str("data_dir: /tmp/x\nmin_length: 10\nmax_length: 5\n").unwrap();
        assert!(PdbSelector::new(config, Rc::new(UrlFetcher::new())).is_err());
    }

    #[test]
    fn test_file_identifier() {
        let config: PdbSelectorConfig = serde_yaml::from_str(
            "data_dir: /tmp/x\nmin_length: 50\nmax_length: 256\nexperiment_types: [diffraction, EM]\nworst_resolution: 5\n",
        )
        .unwrap();
        let selector = PdbSelector::new(config, Rc::new(UrlFetcher::new())).unwrap();
        assert_eq!(
            selector.file_identifier(),
            "df_pdb_f1.0_minl50_maxl256_mtprotein_etdiffractionEM_minoNone_maxoNone_minrNone_maxr5.0_rnsrTrue"
        );
    }
}
