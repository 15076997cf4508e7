//! pdbchains-core
//!
//! - select (pdb, chain) pairs from the wwPDB derived-data files.
//! - download raw structures and convert each chain to atom37 tensors.
//! - build data modules from composed configuration through a `_target_` registry.
//! - run the whole thing and write a dataset manifest.
//!
mod datamodule;
mod error;
mod featurize;
mod fetch;
mod idlist;
mod pipeline;
mod registry;
mod residue;
mod selector;
mod table;

pub use datamodule::{DataModule, DataModuleConfig, StructureFormat};
pub use error::BuildError;
pub use featurize::{open_structure, ChainFeatures};
pub use fetch::{join_url, Fetch, UrlFetcher};
pub use idlist::{open_id_source, read_id_list, read_ids};
pub use pipeline::{build_dataset, DatasetBuild};
pub use registry::{BuildContext, DataModuleFactory, Registry, SelectorFactory, TARGET_KEY};
pub use selector::{rows_to_frame, ChainRow, DataSelect, PdbSelector, PdbSelectorConfig, SeqresRecord};
pub use table::{filter_by_ids, require_columns, string_column, write_manifest};
pub use table::{CHAIN_COLUMN, PDB_COLUMN};
