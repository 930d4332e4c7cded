//! Tenor CLI - Scenario runner and quoting tool
//!
//! Replays scripted lend/borrow/settle scenarios against an in-memory
//! fixed-maturity pool and prices single trades against a given curve.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

mod config;
mod quote;
mod scenario;

use config::ScenarioConfig;

#[derive(Parser)]
#[command(name = "tenor")]
#[command(about = "Tenor CLI - Simulate and quote fixed-maturity lending pools", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output (debug logging from the pool engine)
    #[arg(short, long)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file
    Run {
        /// Path to the scenario (TOML)
        scenario: PathBuf,
    },

    /// Write a sample scenario
    Init {
        /// Output path
        #[arg(default_value = "scenario.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Price a single trade
    Quote {
        #[command(subcommand)]
        command: QuoteCommands,
    },
}

#[derive(clap::Args, Clone, Copy)]
struct CurveArgs {
    /// Asset axis
    #[arg(long)]
    x: u128,

    /// Interest axis
    #[arg(long)]
    y: u128,

    /// Collateral axis
    #[arg(long)]
    z: u128,

    /// Seconds to maturity
    #[arg(long)]
    duration: u64,

    /// Pool fee in basis points
    #[arg(long, default_value = "0")]
    fee_bps: u16,

    /// Protocol fee in basis points
    #[arg(long, default_value = "0")]
    protocol_fee_bps: u16,
}

impl CurveArgs {
    fn market(&self) -> anyhow::Result<quote::Market> {
        quote::Market::new(self.x, self.y, self.z, self.duration, self.fee_bps, self.protocol_fee_bps)
    }
}

#[derive(Subcommand)]
enum QuoteCommands {
    /// Quote lending asset into the pool
    Lend {
        #[command(flatten)]
        curve: CurveArgs,

        /// Asset to lend
        #[arg(long)]
        amount: u128,

        /// Minimum bond interest to accept
        #[arg(long, default_value = "0")]
        min_bond_interest: u128,

        /// Minimum insurance interest to accept
        #[arg(long, default_value = "0")]
        min_insurance_interest: u128,
    },

    /// Quote borrowing asset from the pool
    Borrow {
        #[command(flatten)]
        curve: CurveArgs,

        /// Asset to borrow
        #[arg(long)]
        amount: u128,
    },
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
    env_logger::Builder::from_default_env().filter_level(level).init();

    match cli.command {
        Commands::Run { scenario: file } => {
            let path = expand(&file);
            let config = ScenarioConfig::load(&path)?;
            let report = scenario::run(&config)
                .with_context(|| format!("Scenario {} failed", path.display()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                scenario::print_report(&report);
            }
        }
        Commands::Init { path, force } => {
            let path = expand(&path);
            ScenarioConfig::write_sample(&path, force)?;
            println!("{} {}", "Wrote sample scenario to".bright_green(), path.display());
        }
        Commands::Quote { command } => match command {
            QuoteCommands::Lend { curve, amount, min_bond_interest, min_insurance_interest } => {
                let target = tenor::math::LendTarget { min_bond_interest, min_insurance_interest };
                let view = quote::lend(&curve.market()?, amount, target)?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&view)?);
                } else {
                    quote::print_lend(&view);
                }
            }
            QuoteCommands::Borrow { curve, amount } => {
                let view = quote::borrow(&curve.market()?, amount)?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&view)?);
                } else {
                    quote::print_borrow(&view);
                }
            }
        },
    }

    Ok(())
}
