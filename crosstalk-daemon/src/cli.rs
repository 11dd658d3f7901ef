use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "crosstalk", version, about = "Multi-protocol chat bridge daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bridge daemon.
    Run(RunCmd),
}

#[derive(Args)]
pub struct RunCmd {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<String>,
}
