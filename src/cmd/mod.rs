mod order;
mod report;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sql-explorer")]
#[command(version)]
#[command(about = "Map a database schema: tables, views, routines, and their dependencies", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate schema and dependency reports from a schema script
    Report {
        /// Input schema script (DDL)
        script: PathBuf,

        /// Output directory for report files
        #[arg(short, long, default_value = "reports")]
        output: PathBuf,

        /// Database name used in report file names (default: script file stem)
        #[arg(short, long)]
        database: Option<String>,

        /// Overwrite report files if they exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Print tables in dependency order (parents before children)
    Order {
        /// Input schema script (DDL)
        script: PathBuf,

        /// Fail with a non-zero exit code if FK cycles prevent a strict order
        #[arg(long)]
        check: bool,

        /// Output the order as JSON
        #[arg(long)]
        json: bool,

        /// Reverse the order (children before parents)
        #[arg(long)]
        reverse: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Report {
            script,
            output,
            database,
            overwrite,
        } => report::run(script, output, database, overwrite),
        Commands::Order {
            script,
            check,
            json,
            reverse,
        } => order::run(script, check, json, reverse),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "sql-explorer",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}
