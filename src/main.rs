mod config;
mod embedding;
mod error;
mod knowledge;
mod runner;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use dotenv::dotenv;
use env_logger::Builder;
use knowledge::brain::{Brain, Indexer, QueryOutcome};
use knowledge::generator::AnalysisProvider;
use knowledge::storage::PineconeIndex;
use log::LevelFilter;
use runner::input::{read_metrics, PartialMetrics};
use runner::load_runners;
use std::io::Write;
use std::path::PathBuf;

#[macro_use]
extern crate log;

/// Find runners and animals with a similar gait.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed the reference runners and upload them to the vector index.
    Upload {
        #[arg(long, default_value = "data/runners.json")]
        data: PathBuf,
    },
    /// Match a gait against the index and ask for an expert analysis.
    Demo {
        /// Steps per minute; prompted for when omitted.
        #[arg(long)]
        cadence: Option<f32>,
        /// 0 = toe, 1 = heel; prompted for when omitted.
        #[arg(long)]
        heel_strike: Option<f32>,
        /// Centimetres; prompted for when omitted.
        #[arg(long)]
        vertical_oscillation: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // read .env
    dotenv().ok();

    // init logger
    let log_level = std::env::var("RUST_LOG").unwrap_or_default();

    if log_level == "debug" {
        Builder::new()
            .filter(None, LevelFilter::Off)
            .filter(Some("gaitmatch::knowledge"), LevelFilter::Debug)
            .filter(Some("gaitmatch"), LevelFilter::Debug)
            .init();
    } else if log_level == "info" {
        Builder::new()
            .filter(None, LevelFilter::Off)
            .filter(Some("gaitmatch::knowledge"), LevelFilter::Info)
            .filter(Some("gaitmatch"), LevelFilter::Info)
            .init();
    } else {
        env_logger::init();
    }

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Upload { data } => upload(&config, data).await,
        Command::Demo {
            cadence,
            heel_strike,
            vertical_oscillation,
        } => {
            let given = PartialMetrics {
                cadence,
                heel_strike,
                vertical_oscillation,
            };
            demo(&config, given).await
        }
    }
}

async fn upload(config: &Config, data: PathBuf) -> Result<()> {
    // validate every record before touching the network
    let runners = load_runners(&data)?;
    let index = PineconeIndex::connect(&config.pinecone).await?;
    let indexer = Indexer::new(index);

    let mut stdout = std::io::stdout();
    let count = indexer.index(&runners, &mut stdout).await?;
    writeln!(
        stdout,
        "\nUploaded {} vectors to index '{}'",
        count, config.pinecone.index
    )?;
    Ok(())
}

async fn demo(config: &Config, given: PartialMetrics) -> Result<()> {
    let provider = AnalysisProvider::from_config(config.require_provider()?);
    info!("analysis provider: {}", provider.name());

    let mut stdout = std::io::stdout();
    writeln!(stdout, "\nEnter gait metrics to find similar runners/animals:\n")?;
    let metrics = read_metrics(given, &mut std::io::stdin().lock(), &mut stdout)?;

    let index = PineconeIndex::connect(&config.pinecone).await?;
    let brain = Brain::new(index, provider);
    match brain.query(&metrics, &mut stdout).await? {
        QueryOutcome::NoMatches => {}
        QueryOutcome::Analysed { matches, analysis } => {
            debug!(
                "analysis of {} chars against {} matches",
                analysis.len(),
                matches.len()
            );
            writeln!(stdout, "\nDone!")?;
        }
    }
    Ok(())
}
