use super::commands;
use clap::Parser;
use std::path::PathBuf;

/// Build a dataset of PDB chains, optionally restricted to a list of entries.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Experiment configuration to compose.
    #[arg(long = "config_name", default_value = "training_ca")]
    config_name: String,

    /// File with one PDB id per line; `-` reads standard input.
    #[arg(long = "pid_list_file")]
    pid_list_file: Option<String>,

    /// Directory holding `experiment_config/` and `datasets_config/`.
    #[arg(long = "config_dir", default_value = "configs")]
    config_dir: PathBuf,

    /// Environment file layered under the process environment.
    #[arg(long = "env_file", default_value = ".env")]
    env_file: PathBuf,
}

impl Cli {
    pub fn execute(self) -> anyhow::Result<()> {
        commands::build::execute(
            &self.config_dir,
            &self.config_name,
            self.pid_list_file.as_deref(),
            &self.env_file,
        )
    }
}
