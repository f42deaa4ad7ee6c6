use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod dataset;
mod errors;
mod evaluation;
mod metrics;
mod models;
mod output;
mod parsing;
mod respond;
mod runner;
mod strategy;

use crate::config::Config;
use crate::output::OutputFormat;
use crate::runner::Runner;
use crate::strategy::Strategy;

/// Review rating evaluation CLI - compare prompting strategies for predicting star ratings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output - log progress for each API request
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate prompting strategies against a labelled review dataset
    Evaluate {
        /// Path to the TOML configuration file
        run_file: PathBuf,

        /// Output format: plain or json
        #[arg(short, long, default_value = "plain")]
        output: OutputFormat,

        /// Evaluate only these strategies, overriding the configuration
        #[arg(short, long, value_delimiter = ',')]
        strategy: Vec<Strategy>,
    },
    /// Generate a reply, summary and suggestions for one customer review
    Respond {
        /// Path to the TOML configuration file
        run_file: PathBuf,

        /// Star rating given by the customer
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,

        /// Review text
        #[arg(long)]
        review: String,

        /// Output format: plain or json
        #[arg(short, long, default_value = "plain")]
        output: OutputFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Evaluate {
            run_file,
            output,
            strategy,
        } => {
            let mut config = Config::from_file(&run_file)?;
            if !strategy.is_empty() {
                config.strategies.clear();
                for s in strategy {
                    if !config.strategies.contains(&s) {
                        config.strategies.push(s);
                    }
                }
            }

            let mut runner = Runner::new(config)?;
            let report = runner.run_evaluation().await?;

            output::print_metrics(&report.metrics, output)?;
        }
        Command::Respond {
            run_file,
            rating,
            review,
            output,
        } => {
            let config = Config::from_file(&run_file)?;
            let generator = match client::build_generator(&config.model) {
                Ok(generator) => Some(generator),
                Err(e) => {
                    warn!(error = %e, "text generator unavailable, replying from fallback table");
                    None
                }
            };

            let reply = respond::generate_reply(generator.as_deref(), rating, &review).await?;

            output::print_reply(&reply, output)?;
        }
    }

    Ok(())
}
