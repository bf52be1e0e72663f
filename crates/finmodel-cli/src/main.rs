mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::analyze::AnalyzeArgs;
use commands::model::ModelArgs;
use commands::valuation::{NpvArgs, RealOptionArgs};
use config::EngineOverrides;

/// Financial projection, valuation, simulation and distress modelling
#[derive(Parser)]
#[command(
    name = "finmodel",
    version,
    about = "Financial projection, valuation, simulation and distress modelling",
    long_about = "Projects financial statements under macroeconomic, industry and company \
                  assumptions with decimal precision. Runs scenario and sensitivity sweeps, \
                  Monte Carlo risk simulation, bankruptcy-risk scoring, crisis stress tests \
                  and real option valuation, alone or as one combined analysis."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(flatten)]
    overrides: EngineOverrides,

    /// Log engine progress to stderr at debug level. RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Project the latest period forward under the resolved assumptions
    Project(ModelArgs),
    /// Run the base, optimistic, pessimistic and stressed scenarios
    Scenarios(ModelArgs),
    /// Sweep each driver and report the NPV response
    Sensitivity(ModelArgs),
    /// Monte Carlo simulation over the risk factors
    Simulate(ModelArgs),
    /// Bankruptcy-risk scores and distress tier
    Distress(ModelArgs),
    /// Apply the crisis shock catalog
    Stress(ModelArgs),
    /// Value an expansion, abandonment or deferral option
    RealOption(RealOptionArgs),
    /// NPV and IRR of a raw cash flow series
    Npv(NpvArgs),
    /// Run every requested analysis and assemble one result
    Analyze(AnalyzeArgs),
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

fn init_tracing(verbose: u8) {
    let level = if verbose > 0 { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let engine = config::load_engine(cli.config.as_deref(), &cli.overrides)?;
    match cli.command {
        Commands::Project(args) => commands::model::run_project(&engine, args),
        Commands::Scenarios(args) => commands::model::run_scenarios(&engine, args),
        Commands::Sensitivity(args) => commands::model::run_sensitivity(&engine, args),
        Commands::Simulate(args) => commands::model::run_simulate(&engine, args),
        Commands::Distress(args) => commands::model::run_distress(&engine, args),
        Commands::Stress(args) => commands::model::run_stress(&engine, args),
        Commands::RealOption(args) => commands::valuation::run_real_option(&engine, args),
        Commands::Npv(args) => commands::valuation::run_npv(args),
        Commands::Analyze(args) => commands::analyze::run_analyze(&engine, args),
        Commands::Version => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
    }
}

fn main() {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        println!("finmodel {}", env!("CARGO_PKG_VERSION"));
        return;
    }
    init_tracing(cli.verbose);

    let format = cli.output.clone();
    match run(cli) {
        Ok(value) => {
            output::format_output(&format, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
