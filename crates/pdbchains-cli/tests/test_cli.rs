use assert_cmd::Command;
use pdbchains_test_data::TestMirror;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DEFAULT_IDENTIFIER: &str =
    "df_pdb_f1.0_minlNone_maxlNone_mtprotein_etNone_minoNone_maxoNone_minrNone_maxrNone_rnsrTrue";

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A working directory with `configs/`, a `.env` and an empty data directory.
fn workspace(mirror: &TestMirror) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        ".env",
        &format!(
            "DATA_PATH={}\nexport MIRROR=\"{}\"\n",
            root.join("data").display(),
            mirror.url()
        ),
    );
    write(
        root,
        "configs/experiment_config/training_ca.yaml",
        "dataset: pdb_train\nseed: 5\n",
    );
    write(
        root,
        "configs/experiment_config/small.yaml",
        "defaults:\n  - training_ca\n  - _self_\ndataset_config_subdir: foo\ndataset: pdb_small\n",
    );
    write(
        root,
        "configs/datasets_config/pdb_train.yaml",
        "datamodule:
  _target_: pdb_datamodule
  format: pdb
  structure_url: ${oc.env:MIRROR}
  batch_size: 4
  dataselector:
    _target_: pdb_dataselector
    data_dir: ${oc.env:DATA_PATH}/pdb_train
    metadata_url: ${oc.env:MIRROR}
",
    );
    write(
        root,
        "configs/datasets_config/foo/pdb_small.yaml",
        "datamodule:
  _target_: pdb_datamodule
  format: pdb
  structure_url: ${oc.env:MIRROR}
  dataselector:
    _target_: pdb_dataselector
    data_dir: ${oc.env:DATA_PATH}/pdb_small
    metadata_url: ${oc.env:MIRROR}
    min_length: 4
",
    );
    dir
}

fn command(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pdb-dataset-from-list").unwrap();
    cmd.current_dir(dir)
        .env_remove("DATA_PATH")
        .env_remove("MIRROR")
        .env("RUST_LOG", "info");
    cmd
}

fn manifest(dir: &Path, subdir: &str, identifier: &str) -> PathBuf {
    dir.join("data")
        .join(subdir)
        .join(format!("{identifier}.csv"))
}

fn read_manifest(path: &Path) -> DataFrame {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .unwrap()
        .finish()
        .unwrap()
}

fn pdb_values(df: &DataFrame) -> Vec<String> {
    df.column("pdb")
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap().to_string())
        .collect()
}

#[test]
fn test_cli_filters_from_stdin() {
    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);

    command(dir.path())
        .arg("--pid_list_file")
        .arg("-")
        .write_stdin("1abc\n#comment\n\n2xyz\n")
        .assert()
        .success();

    let path = manifest(dir.path(), "pdb_train", DEFAULT_IDENTIFIER);
    let df = read_manifest(&path);
    assert_eq!(pdb_values(&df), vec!["1abc", "1abc", "2xyz"]);
    assert_eq!(df.get_column_names()[0].as_str(), "pdb");
    assert_eq!(df.get_column_names()[1].as_str(), "chain");

    let processed = dir.path().join("data/pdb_train/processed");
    assert!(processed.join("1abc_A.safetensors").exists());
    assert!(processed.join("2xyz_A.safetensors").exists());
    assert!(!dir.path().join("data/pdb_train/raw/3pqr.pdb").exists());
}

#[test]
fn test_cli_filters_from_file() {
    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);
    write(dir.path(), "ids.txt", "  3pqr  \n# 1abc\n");

    command(dir.path())
        .args(["--config_name", "training_ca", "--pid_list_file", "ids.txt"])
        .assert()
        .success();

    let df = read_manifest(&manifest(dir.path(), "pdb_train", DEFAULT_IDENTIFIER));
    assert_eq!(pdb_values(&df), vec!["3pqr"]);
}

#[test]
fn test_cli_without_list_keeps_selection() {
    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);

    command(dir.path()).assert().success();

    let df = read_manifest(&manifest(dir.path(), "pdb_train", DEFAULT_IDENTIFIER));
    assert_eq!(df.height(), 4);
    assert_eq!(pdb_values(&df), vec!["1abc", "1abc", "2xyz", "3pqr"]);
}

#[test]
fn test_cli_dataset_config_subdir() {
    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);

    command(dir.path())
        .args(["--config_name", "small"])
        .assert()
        .success();

    let identifier =
        "df_pdb_f1.0_minl4_maxlNone_mtprotein_etNone_minoNone_maxoNone_minrNone_maxrNone_rnsrTrue";
    let df = read_manifest(&manifest(dir.path(), "pdb_small", identifier));
    assert_eq!(pdb_values(&df), vec!["1abc", "3pqr"]);
}

#[test]
fn test_cli_process_env_wins_over_env_file() {
    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);
    let elsewhere = tempfile::tempdir().unwrap();

    command(dir.path())
        .env("DATA_PATH", elsewhere.path())
        .args(["--pid_list_file", "-"])
        .write_stdin("2xyz\n")
        .assert()
        .success();

    assert!(elsewhere
        .path()
        .join("pdb_train")
        .join(format!("{DEFAULT_IDENTIFIER}.csv"))
        .exists());
    assert!(!dir.path().join("data").exists());
}

#[test]
fn test_cli_failures() {
    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);

    command(dir.path())
        .arg("--config-name")
        .arg("training_ca")
        .assert()
        .failure();

    let output = command(dir.path())
        .args(["--config_name", "does_not_exist"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to compose experiment config"));

    command(dir.path())
        .args(["--pid_list_file", "missing_ids.txt"])
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn test_cli_ignores_non_utf8_environment() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);

    command(dir.path())
        .env("PDBCHAINS_NOT_UTF8", OsStr::from_bytes(b"\xff\xfe"))
        .args(["--pid_list_file", "-"])
        .write_stdin("2xyz\n")
        .assert()
        .success();

    let df = read_manifest(&manifest(dir.path(), "pdb_train", DEFAULT_IDENTIFIER));
    assert_eq!(pdb_values(&df), vec!["2xyz"]);
}

#[test]
fn test_cli_finds_env_file_in_parent_directory() {
    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);
    let nested = dir.path().join("runs").join("today");
    fs::create_dir_all(&nested).unwrap();

    command(&nested)
        .args(["--config_dir", "../../configs", "--pid_list_file", "-"])
        .write_stdin("3pqr\n")
        .assert()
        .success();

    let df = read_manifest(&manifest(dir.path(), "pdb_train", DEFAULT_IDENTIFIER));
    assert_eq!(pdb_values(&df), vec!["3pqr"]);
}

#[test]
fn test_cli_unused_interpolations_do_not_fail() {
    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);
    write(
        dir.path(),
        "configs/experiment_config/with_logging.yaml",
        "defaults:\n  - training_ca\n  - _self_\nlog_dir: ${oc.env:PDBCHAINS_UNSET_LOG_DIR}\nrun_dir: ${hydra:runtime.cwd}/out\n",
    );

    command(dir.path())
        .env_remove("PDBCHAINS_UNSET_LOG_DIR")
        .args(["--config_name", "with_logging", "--pid_list_file", "-"])
        .write_stdin("1abc\n")
        .assert()
        .success();

    let df = read_manifest(&manifest(dir.path(), "pdb_train", DEFAULT_IDENTIFIER));
    assert_eq!(pdb_values(&df), vec!["1abc", "1abc"]);
}

#[test]
fn test_cli_rejects_structured_dataset_config_subdir() {
    let mirror = TestMirror::create().unwrap();
    let dir = workspace(&mirror);
    write(
        dir.path(),
        "configs/experiment_config/bad_subdir.yaml",
        "dataset: pdb_train\ndataset_config_subdir:\n  name: foo\n",
    );

    let output = command(dir.path())
        .args(["--config_name", "bad_subdir"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dataset_config_subdir"));
    assert!(!dir.path().join("data").exists());
}
