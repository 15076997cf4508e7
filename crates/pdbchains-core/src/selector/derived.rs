//! Parsers for the wwPDB derived-data files.
use anyhow::{bail, Context, Result};
use std::collections::HashMap;

/// One chain entry of `pdb_seqres.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqresRecord {
    pub pdb: String,
    pub chain: String,
    pub molecule_type: String,
    pub length: u32,
    pub name: String,
    pub sequence: String,
}

impl SeqresRecord {
    pub fn id(&self) -> String {
        format!("{}_{}", self.pdb, self.chain)
    }
}

/// Parse `pdb_seqres.txt`:
///
/// ```text
/// >101m_A mol:protein length:154  MYOGLOBIN
/// MVLSEGEWQLVLHVWAKVEAD...
/// ```
pub fn parse_seqres(text: &str) -> Result<Vec<SeqresRecord>> {
    let mut records: Vec<SeqresRecord> = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if let Some(header) = line.strip_prefix('>') {
            let record =
                parse_header(header).with_context(|| format!("pdb_seqres.txt line {}", idx + 1))?;
            records.push(record);
        } else if !line.is_empty() {
            match records.last_mut() {
                Some(record) => record.sequence.push_str(line.trim()),
                None => bail!("pdb_seqres.txt line {}: sequence before header", idx + 1),
            }
        }
    }
    Ok(records)
}

fn parse_header(header: &str) -> Result<SeqresRecord> {
    let (id, rest) = header.split_once(' ').unwrap_or((header, ""));
    let Some((pdb, chain)) = id.split_once('_') else {
        bail!("malformed id `{id}`");
    };
    let rest = rest.trim_start();
    let (mol, rest) = rest.split_once(' ').unwrap_or((rest, ""));
    let Some(molecule_type) = mol.strip_prefix("mol:") else {
        bail!("missing mol: field in `{header}`");
    };
    let rest = rest.trim_start();
    let (length, name) = rest.split_once(' ').unwrap_or((rest, ""));
    let Some(length) = length.strip_prefix("length:") else {
        bail!("missing length: field in `{header}`");
    };
    let length = length
        .parse()
        .with_context(|| format!("invalid length `{length}`"))?;
    Ok(SeqresRecord {
        pdb: pdb.to_lowercase(),
        chain: chain.to_string(),
        molecule_type: molecule_type.to_string(),
        length,
        name: name.trim().to_string(),
        sequence: String::new(),
    })
}

/// Parse `pdb_entry_type.txt` into lowercase pdb id -> experiment type.
pub fn parse_entry_types(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pdb = fields.next()?;
            let _kind = fields.next()?;
            let experiment = fields.next()?;
            Some((pdb.to_lowercase(), experiment.to_string()))
        })
        .collect()
}

/// Parse `resolu.idx` into lowercase pdb id -> resolution. Entries without a
/// resolution (-1.00, as used for NMR) are left out.
pub fn parse_resolutions(text: &str) -> HashMap<String, f64> {
    text.lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let (pdb, resolution) = line.split_once(';')?;
            let resolution: f64 = resolution.trim().parse().ok()?;
            let pdb = pdb.trim();
            (!pdb.is_empty() && resolution > 0.0).then(|| (pdb.to_lowercase(), resolution))
        })
        .collect()
}
