pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "procroute-cli")]
#[command(about = "procroute CLI - inspect the routes compiled from stored procedures")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, conflicts_with = "json", help = "Output in YAML format")]
    pub yaml: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Compile the catalog and print the route table")]
    Routes(commands::routes::RoutesArgs),

    #[command(about = "Compile the catalog and fail on any compile error")]
    Check,

    #[command(about = "Derive the method and path of a procedure name offline")]
    Path(commands::path::PathArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else if cli.yaml {
            OutputFormat::Yaml
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Routes(args) => commands::routes::handle(args, output_format).await,
        Commands::Check => commands::check::handle(output_format).await,
        Commands::Path(args) => commands::path::handle(args, output_format),
    }
}
