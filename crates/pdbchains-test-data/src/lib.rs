//! pdbchains-test-data
//!
//! Test files embedded in the crate for use in testing.
//!
//! Structures and wwPDB derived-data files are represented as `TestFile` objects which
//! package the raw bytes and create temporary files for programs to operate on.
//! `TestMirror` lays all of them out in one temporary directory that can stand in for
//! both the RCSB download server and the wwPDB derived-data server via a `file://` URL.
use std::fs;
use std::path::Path;
use tempfile::{Builder, NamedTempFile, TempDir};

#[derive(Debug)]
/// Test File
///
/// Example usage:
///
/// ```ignore
/// // returns (filepath, _tempfile_handle).
/// // _handle ensures the tempfile remains in scope
/// use pdbchains_test_data::TestFile;
/// let (prot_file, _temp) = TestFile::protein_01().create_temp().unwrap();
/// ```
pub struct TestFile {
    filebinary: &'static [u8],
    filename: &'static str,
    suffix: &'static str,
}

impl TestFile {
    /// 1abc.pdb: two protein chains (A: 3 residues, B: 4 residues) and a water on A.
    pub fn protein_01() -> Self {
        Self {
            filebinary: include_bytes!("../data/structures/1abc.pdb"),
            filename: "1abc.pdb",
            suffix: "pdb",
        }
    }
    /// 2xyz.pdb: a single protein chain A of 3 residues.
    pub fn protein_02() -> Self {
        Self {
            filebinary: include_bytes!("../data/structures/2xyz.pdb"),
            filename: "2xyz.pdb",
            suffix: "pdb",
        }
    }
    /// 3pqr.pdb: a single protein chain A of 5 residues.
    pub fn protein_03() -> Self {
        Self {
            filebinary: include_bytes!("../data/structures/3pqr.pdb"),
            filename: "3pqr.pdb",
            suffix: "pdb",
        }
    }
    /// `pdb_seqres.txt` covering 1abc, 2xyz, 3pqr and 4unk (six chains, one nucleic acid).
    pub fn seqres() -> Self {
        Self {
            filebinary: include_bytes!("../data/derived/pdb_seqres.txt"),
            filename: "pdb_seqres.txt",
            suffix: "txt",
        }
    }
    /// `pdb_entry_type.txt` for the four fixture entries.
    pub fn entry_types() -> Self {
        Self {
            filebinary: include_bytes!("../data/derived/pdb_entry_type.txt"),
            filename: "pdb_entry_type.txt",
            suffix: "txt",
        }
    }
    /// `resolu.idx` for the four fixture entries. 3pqr is NMR (-1.00).
    pub fn resolutions() -> Self {
        Self {
            filebinary: include_bytes!("../data/derived/resolu.idx"),
            filename: "resolu.idx",
            suffix: "idx",
        }
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.filebinary
    }

    pub fn create_temp(&self) -> std::io::Result<(String, NamedTempFile)> {
        let temp = Builder::new()
            .suffix(&format!(".{}", self.suffix))
            .tempfile()?;

        fs::write(&temp, self.filebinary)?;
        let path = temp.path().to_string_lossy().into_owned();

        Ok((path, temp))
    }

    /// Write the file under its canonical name into `dir`.
    pub fn write_into(&self, dir: &Path) -> std::io::Result<()> {
        fs::write(dir.join(self.filename), self.filebinary)
    }
}

/// A temporary directory laid out like the remote servers.
///
/// ```ignore
/// let mirror = TestMirror::create().unwrap();
/// let structure_url = mirror.url(); // file:///tmp/.../1abc.pdb etc.
/// let metadata_url = mirror.url();  // file:///tmp/.../pdb_seqres.txt, index/resolu.idx
/// ```
pub struct TestMirror {
    dir: TempDir,
}

impl TestMirror {
    pub fn create() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        for file in [
            TestFile::protein_01(),
            TestFile::protein_02(),
            TestFile::protein_03(),
            TestFile::seqres(),
            TestFile::entry_types(),
        ] {
            file.write_into(dir.path())?;
        }
        let index = dir.path().join("index");
        fs::create_dir_all(&index)?;
        TestFile::resolutions().write_into(&index)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `file://` URL of the mirror root.
    pub fn url(&self) -> String {
        format!("file://{}", self.dir.path().display())
    }
}
