use clap::Parser;
use env_logger::Env;
mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = cli::Cli::parse();
    cli.execute()?;
    Ok(())
}
