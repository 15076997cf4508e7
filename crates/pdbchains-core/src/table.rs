//! Dataset table helpers. The table itself is a polars `DataFrame` with one row per
//! (pdb, chain) pair.
use anyhow::{anyhow, ensure, Context, Result};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

pub const PDB_COLUMN: &str = "pdb";
pub const CHAIN_COLUMN: &str = "chain";

pub fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    for name in names {
        ensure!(
            df.column(name).is_ok(),
            "dataset table has no `{name}` column"
        );
    }
    Ok(())
}

fn string_values(df: &DataFrame, name: &str) -> Result<StringChunked> {
    let column = df
        .column(name)
        .with_context(|| format!("dataset table has no `{name}` column"))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series.str()?.clone())
}

/// All values of a string column. Nulls are an error.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    string_values(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(str::to_string)
                .ok_or_else(|| anyhow!("null `{name}` in row {row}"))
        })
        .collect()
}

/// Keep the rows whose `pdb` value is in `ids`, in their original order.
pub fn filter_by_ids(df: &DataFrame, ids: &[String]) -> Result<DataFrame> {
    let keep: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mask: BooleanChunked = string_values(df, PDB_COLUMN)?
        .into_iter()
        .map(|value| value.is_some_and(|id| keep.contains(id)))
        .collect();
    Ok(df.filter(&mask)?)
}

/// Write `df` as comma separated values with a header row and no index column.
pub fn write_manifest(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataFrame {
        df!(
            "pdb" => ["A1", "B2", "C3", "A1"],
            "chain" => ["A", "A", "B", "B"],
            "length" => [120i64, 85, 300, 118]
        )
        .unwrap()
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_keeps_listed_rows_in_order() {
        let df = table();
        let filtered = filter_by_ids(&df, &ids(&["B2", "A1"])).unwrap();
        assert_eq!(
            string_column(&filtered, PDB_COLUMN).unwrap(),
            vec!["A1", "B2", "A1"]
        );
        assert_eq!(
            string_column(&filtered, CHAIN_COLUMN).unwrap(),
            vec!["A", "A", "B"]
        );
    }

    #[test]
    fn test_filter_is_idempotent_and_shrinking() {
        let df = table();
        let list = ids(&["A1", "C3", "Z9", "A1"]);
        let once = filter_by_ids(&df, &list).unwrap();
        let twice = filter_by_ids(&once, &list).unwrap();
        assert!(once.equals(&twice));
        assert!(once.height() <= df.height());
        assert_eq!(once.get_column_names(), df.get_column_names());

        let none = filter_by_ids(&df, &[]).unwrap();
        assert_eq!(none.height(), 0);
        assert_eq!(none.width(), df.width());
    }

    #[test]
    fn test_missing_columns() {
        let df = df!("pdb" => ["A1"]).unwrap();
        let err = require_columns(&df, &[PDB_COLUMN, CHAIN_COLUMN]).unwrap_err();
        assert!(err.to_string().contains("`chain`"));

        let no_pdb = df!("chain" => ["A"]).unwrap();
        assert!(filter_by_ids(&no_pdb, &ids(&["A1"])).is_err());
    }

    #[test]
    fn test_manifest_has_no_index_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("df_pdb_test.csv");
        let mut df = table();
        write_manifest(&mut df, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("pdb,chain,length"));
        assert_eq!(lines.next(), Some("A1,A,120"));
        assert_eq!(content.lines().count(), 5);
    }
}
