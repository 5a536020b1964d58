use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskmill")]
#[command(author, version, about = "Namespace-based task runner for Go projects", long_about = None)]
pub struct Cli {
    #[arg(
        value_name = "TARGET",
        help = "Targets to run in order, e.g. build, test:race, ci:release"
    )]
    pub targets: Vec<String>,

    #[arg(short, long, help = "List available targets")]
    pub list: bool,

    #[arg(
        short = 'C',
        long = "directory",
        value_name = "DIR",
        help = "Project root directory"
    )]
    pub directory: Option<PathBuf>,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Log every command before it runs")]
    pub verbose: bool,

    #[arg(long, help = "Print commands instead of running them")]
    pub dry_run: bool,

    #[arg(
        long,
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = "10",
        help = "Show the last N runs"
    )]
    pub history: Option<usize>,

    #[arg(long, conflicts_with = "history", help = "Delete the recorded run history")]
    pub clear_history: bool,

    #[arg(long, help = "Write a default taskmill.toml to the project root")]
    pub init: bool,
}

impl Cli {
    pub fn project_root(&self) -> anyhow::Result<PathBuf> {
        let root = match &self.directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        std::fs::canonicalize(&root)
            .map_err(|err| anyhow::anyhow!("Invalid project directory {}: {}", root.display(), err))
    }
}
