//! Identifier lists used to restrict a dataset to known entries.
//!
//! One identifier per line; surrounding whitespace is trimmed, blank lines and lines
//! starting with `#` are skipped. The path `-` reads standard input.
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};

/// Open `path` for reading, or standard input for `-`.
pub fn open_id_source(path: &str) -> Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("failed to open id list {path}"))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Lazily yield the identifiers of `reader`.
pub fn read_ids<R: BufRead>(reader: R) -> impl Iterator<Item = io::Result<String>> {
    reader.lines().filter_map(|line| match line {
        Ok(line) => {
            let id = line.trim();
            if id.is_empty() || id.starts_with('#') {
                None
            } else {
                Some(Ok(id.to_string()))
            }
        }
        Err(e) => Some(Err(e)),
    })
}

pub fn read_id_list(path: &str) -> Result<Vec<String>> {
    let source = open_id_source(path)?;
    read_ids(source)
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read id list {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_skips_blank_and_comment_lines() {
        let input = "A1\n#comment\n\nB2\n   \n  # indented comment\n  C3  \r\n";
        let ids: Vec<String> = read_ids(Cursor::new(input))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(ids, vec!["A1", "B2", "C3"]);
        assert!(ids.iter().all(|id| !id.is_empty() && !id.starts_with('#')));
    }

    #[test]
    fn test_reads_lazily() {
        let mut ids = read_ids(Cursor::new("first\nsecond\n"));
        assert_eq!(ids.next().unwrap().unwrap(), "first");
        assert_eq!(ids.next().unwrap().unwrap(), "second");
        assert!(ids.next().is_none());
    }

    #[test]
    fn test_read_id_list_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "1abc\n# excluded\n2xyz\n1abc\n").unwrap();
        let ids = read_id_list(path.to_str().unwrap()).unwrap();
        assert_eq!(ids, vec!["1abc", "2xyz", "1abc"]);
    }

    #[test]
    fn test_missing_file() {
        let err = read_id_list("/definitely/not/here.txt").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
