//! CLI definition using clap.

use clap::Parser;
use std::path::PathBuf;

use skyquery::environment::EnvironmentMode;

/// Skyquery - ask questions about an AWS account in plain language
#[derive(Parser, Debug)]
#[command(name = "skyquery")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use the simulated AWS environment instead of the live account
    #[arg(long)]
    pub mock: bool,

    /// Optional config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// AWS region (overrides aws.region from the config file)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn mode(&self) -> EnvironmentMode {
        EnvironmentMode::from_mock_flag(self.mock)
    }
}
