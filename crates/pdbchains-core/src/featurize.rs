//! Chain -> Tensor conversion for processed dataset artifacts.
use crate::fetch::persist_with;
use crate::residue::{aa1to_int, aa3to1, AAAtom};
use anyhow::{anyhow, ensure, Context, Result};
use candle_core::{Device, Tensor};
use itertools::Itertools;
use pdbtbx::{Chain, PDB};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use strum::EnumCount;

const ATOM37: usize = AAAtom::COUNT;

/// Per-chain features in the atom37 layout.
///
/// Every residue with at least one non-hetero atom becomes one row. Coordinates of
/// atoms that are not present stay at zero with a zero mask entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainFeatures {
    coords: Vec<f32>,
    coord_mask: Vec<u8>,
    residue_type: Vec<u32>,
    residue_pdb_idx: Vec<i64>,
}

impl ChainFeatures {
    pub fn from_structure(pdb: &PDB, chain_id: &str) -> Result<Self> {
        let chain = pdb
            .chains()
            .find(|chain| chain.id() == chain_id)
            .ok_or_else(|| {
                anyhow!(
                    "chain `{chain_id}` not found (available: {})",
                    pdb.chains().map(|c| c.id()).join(",")
                )
            })?;
        Self::from_chain(chain)
    }

    pub fn from_chain(chain: &Chain) -> Result<Self> {
        let mut features = Self {
            coords: Vec::new(),
            coord_mask: Vec::new(),
            residue_type: Vec::new(),
            residue_pdb_idx: Vec::new(),
        };

        for residue in chain
            .residues()
            .filter(|residue| residue.atoms().any(|atom| !atom.hetero()))
        {
            let row = features.residue_type.len();
            features
                .residue_type
                .push(aa1to_int(aa3to1(residue.name().unwrap_or_default())));
            features.residue_pdb_idx.push(residue.serial_number() as i64);
            features.coords.extend([0f32; ATOM37 * 3]);
            features.coord_mask.extend([0u8; ATOM37]);

            for atom in residue.atoms() {
                let Ok(slot) = AAAtom::from_str(atom.name()) else {
                    continue;
                };
                let mask_idx = row * ATOM37 + slot.to_index();
                // first conformer wins
                if features.coord_mask[mask_idx] == 1 {
                    continue;
                }
                let (x, y, z) = atom.pos();
                let base_idx = mask_idx * 3;
                features.coords[base_idx] = x as f32;
                features.coords[base_idx + 1] = y as f32;
                features.coords[base_idx + 2] = z as f32;
                features.coord_mask[mask_idx] = 1;
            }
        }

        ensure!(
            !features.residue_type.is_empty(),
            "chain `{}` has no polymer residues",
            chain.id()
        );
        Ok(features)
    }

    /// Number of residues.
    pub fn len(&self) -> usize {
        self.residue_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residue_type.is_empty()
    }

    pub fn residue_type(&self) -> &[u32] {
        &self.residue_type
    }

    pub fn residue_pdb_idx(&self) -> &[i64] {
        &self.residue_pdb_idx
    }

    /// Tensors keyed by name:
    /// `coords` [L, 37, 3], `coord_mask` [L, 37], `residue_type` [L], `residue_pdb_idx` [L].
    pub fn to_tensors(&self, device: &Device) -> candle_core::Result<HashMap<String, Tensor>> {
        let n = self.len();
        let mut tensors = HashMap::new();
        tensors.insert(
            "coords".to_string(),
            Tensor::from_slice(&self.coords, (n, ATOM37, 3), device)?,
        );
        tensors.insert(
            "coord_mask".to_string(),
            Tensor::from_slice(&self.coord_mask, (n, ATOM37), device)?,
        );
        tensors.insert(
            "residue_type".to_string(),
            Tensor::from_slice(&self.residue_type, n, device)?,
        );
        tensors.insert(
            "residue_pdb_idx".to_string(),
            Tensor::from_slice(&self.residue_pdb_idx, n, device)?,
        );
        Ok(tensors)
    }

    pub fn save_to_safetensor(&self, path: &Path) -> Result<()> {
        let tensors = self.to_tensors(&Device::Cpu)?;
        persist_with(path, |temp| Ok(candle_core::safetensors::save(&tensors, temp.path())?))
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Parse a PDB or mmCIF file.
pub fn open_structure(path: &Path) -> Result<PDB> {
    let filename = path
        .to_str()
        .ok_or_else(|| anyhow!("non UTF-8 path {}", path.display()))?;
    let (pdb, warnings) = pdbtbx::open(filename).map_err(|errors| {
        anyhow!(
            "failed to parse {}: {}",
            path.display(),
            errors.iter().map(|e| e.to_string()).join("; ")
        )
    })?;
    if !warnings.is_empty() {
        log::debug!("{}: {} parser warnings", path.display(), warnings.len());
    }
    Ok(pdb)
}
