mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::promote::{PromoteArgs, PromoteSensitivityArgs};
use commands::sensitivity::SensitivityArgs;
use commands::structures::{AnalyzeArgs, CompareArgs, DefaultsArgs};

/// Real-estate deal structure analysis
#[derive(Parser)]
#[command(
    name = "deal",
    version,
    about = "Real-estate deal structure analysis and GP/LP promote waterfalls",
    long_about = "A CLI for modeling how a property acquisition could be financed \
                  with decimal precision. Supports all-cash, conventional, bridge/refinance, \
                  assumable and syndication structures, side-by-side comparison, \
                  promote waterfalls, and exit cap rate x rent growth sensitivity."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Emit debug diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Default parameters for one structure (or all) given the base deal
    Defaults(DefaultsArgs),
    /// Model one financing structure
    Analyze(AnalyzeArgs),
    /// Compare structures side by side and pick per-metric winners
    Compare(CompareArgs),
    /// Split a structure's equity cash flows through a GP/LP waterfall
    Promote(PromoteArgs),
    /// Exit cap rate x rent growth sensitivity of IRR and equity multiple
    Sensitivity(SensitivityArgs),
    /// Exit cap rate x rent growth sensitivity of GP and LP returns
    PromoteSensitivity(PromoteSensitivityArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Defaults(args) => commands::structures::run_defaults(args),
        Commands::Analyze(args) => commands::structures::run_analyze(args),
        Commands::Compare(args) => commands::structures::run_compare(args),
        Commands::Promote(args) => commands::promote::run_promote(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args),
        Commands::PromoteSensitivity(args) => commands::promote::run_promote_sensitivity(args),
        Commands::Version => {
            println!("deal {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result.and_then(|value| output::format_output(&cli.output, &value)) {
        Ok(()) => process::exit(0),
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
