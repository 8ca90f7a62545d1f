/*
said - command-line entry point.
`candidates` lists every post the current news would allow; `post` picks one, records its
quotes as used and prints it for the publishing step.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::Config;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use said::candidates::{CandidateGenerator, CandidatePair};
use said::ingestion::NewsFetcher;
use said::sentence::Normalizer;
use said::sources::SourcePool;
use said::storage::{DedupFilter, UsedQuotes};
use said::tokenize::SentenceSplitter;

/// Chance that `post --random` goes ahead when the config does not say.
const DEFAULT_POST_PERCENT: u32 = 10;

#[derive(Parser, Debug)]
#[command(name = "said", about = "Pairs 'she said' and 'he said' news quotes into two-line posts")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate candidates, record one as used and print it
    Post {
        /// Only post a percentage of the time
        #[arg(short, long)]
        random: bool,
    },
    /// Generate and list candidates
    Candidates {
        /// Print one JSON object per candidate
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout only carries posts
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = load_config(args.config).await?;

    match args.command {
        Command::Post { random } => post(&config, random).await,
        Command::Candidates { json } => list_candidates(&config, json).await,
    }
}

async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {:#}", e);
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

/// A fresh generator for one run.
fn build_generator(config: &Config) -> Result<CandidateGenerator> {
    let fetcher = NewsFetcher::new(&config.sources, &config.politeness)?;
    let normalizer = Normalizer::default().with_cosmetic(config.normalizer.cosmetic.unwrap_or(false));

    Ok(CandidateGenerator::new(
        Arc::new(fetcher),
        Arc::new(SentenceSplitter),
        SourcePool::from_config(&config.sources),
    )
    .with_normalizer(normalizer))
}

async fn list_candidates(config: &Config, json: bool) -> Result<()> {
    let generator = build_generator(config)?;
    let candidates = match generator.generate_candidates(None).await {
        Ok(candidates) => candidates,
        Err(e) => {
            error!(%e, "candidate generation failed");
            return Err(e.into());
        }
    };

    for candidate in &candidates {
        if json {
            println!("{}", serde_json::to_string(candidate).context("failed to serialize candidate")?);
        } else {
            println!("{}", candidate.text);
            println!("--");
        }
    }
    info!("listed {} candidates", candidates.len());
    Ok(())
}

fn should_post<R: Rng + ?Sized>(percent: u32, rng: &mut R) -> bool {
    rng.gen_range(0..100) < percent
}

async fn post(config: &Config, random: bool) -> Result<()> {
    if random {
        let percent = config.post.probability_percent.unwrap_or(DEFAULT_POST_PERCENT);
        if !should_post(percent, &mut rand::thread_rng()) {
            info!(percent, "not posting this time");
            return Ok(());
        }
    }

    let generator = build_generator(config)?;
    let store = UsedQuotes::open(&config.database.path)
        .await
        .with_context(|| format!("failed to open used quotes at {}", config.database.path))?;

    let outcome = until_shutdown(choose_and_record(generator, &store), shutdown_signal()).await;

    // The store is closed on every path, including SIGTERM and Ctrl-C
    store.close().await;

    match outcome {
        Ok(chosen) => {
            println!("{}", chosen.text);
            Ok(())
        }
        Err(e) => {
            error!("post failed: {:#}", e);
            Err(e)
        }
    }
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received Ctrl-C"),
                    _ = terminate.recv() => info!("received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Runs `work` unless `shutdown` resolves first.
async fn until_shutdown<T>(work: impl Future<Output = Result<T>>, shutdown: impl Future<Output = ()>) -> Result<T> {
    tokio::select! {
        res = work => res,
        _ = shutdown => Err(anyhow::anyhow!("interrupted")),
    }
}

async fn choose_and_record(generator: CandidateGenerator, store: &UsedQuotes) -> Result<CandidatePair> {
    let candidates = generator.generate_candidates(Some(store as &dyn DedupFilter)).await?;

    let chosen = candidates
        .choose(&mut StdRng::from_entropy())
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no candidates to choose from"))?;
    info!(female = %chosen.female(), male = %chosen.male(), "chose candidate");

    store.record(&chosen.quotes).await.context("failed to store quotes")?;
    Ok(chosen)
}
