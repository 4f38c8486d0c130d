// src/cli.rs
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::processor::ingest::{ingest_symbols, IngestOutcome};
use crate::processor::join::rebuild_joined;
use crate::database::models::JoinPair;
use crate::server;
use crate::utils::timestamp::format_timestamp;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "stock-data-viz")]
#[command(about = "Daily price ingestion and comparison chart service", long_about = None)]
pub struct Cli {
    /// TOML configuration file, layered under STOCKVIZ_* environment variables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch full daily history and upsert it per symbol
    Ingest {
        /// Symbols to ingest (defaults to ingest.symbols)
        symbols: Vec<String>,
    },

    /// Rebuild the joined collection from two ingested series
    Join {
        /// Left-hand symbol
        #[arg(short, long)]
        left: Option<String>,

        /// Right-hand symbol
        #[arg(short, long)]
        right: Option<String>,
    },

    /// Serve the comparison chart over HTTP
    Serve {
        /// Bind address
        #[arg(short, long)]
        bind: Option<String>,

        /// Port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ingest the configured symbols, join them, then serve
    Run,

    /// Show stored row counts
    Status,
}

pub async fn execute_command(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match &cli.command {
        Commands::Join { left, right } => {
            if let Some(left) = left {
                config.join.left = left.clone();
            }
            if let Some(right) = right {
                config.join.right = right.clone();
            }
        }
        Commands::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
        _ => {}
    }

    let ctx = AppContext::connect(config).await?;

    match cli.command {
        Commands::Ingest { symbols } => {
            let symbols = if symbols.is_empty() {
                ctx.config.ingest.symbols.clone()
            } else {
                symbols
            };
            run_ingest(&ctx, &symbols).await
        }
        Commands::Join { .. } => run_join(&ctx).await,
        Commands::Serve { .. } => server::serve(Arc::new(ctx)).await,
        Commands::Run => {
            let symbols = ctx.config.ingest.symbols.clone();
            // A failed symbol still leaves the others joinable
            if let Err(e) = run_ingest(&ctx, &symbols).await {
                tracing::warn!("{:#}", e);
            }
            run_join(&ctx).await?;
            server::serve(Arc::new(ctx)).await
        }
        Commands::Status => show_status(&ctx).await,
    }
}

async fn run_ingest(ctx: &AppContext, symbols: &[String]) -> Result<()> {
    info!("Ingesting {} symbols", symbols.len());
    let outcomes = ingest_symbols(ctx, symbols).await;
    print_outcomes(&outcomes);

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.is_ok())
        .map(|o| o.symbol.as_str())
        .collect();
    if !failed.is_empty() {
        bail!("Ingestion failed for: {}", failed.join(", "));
    }
    Ok(())
}

async fn run_join(ctx: &AppContext) -> Result<()> {
    let pair = ctx.join_pair().context("Invalid join pair")?;
    let report = rebuild_joined(ctx, &pair)
        .await
        .with_context(|| format!("Failed to join {} with {}", pair.left(), pair.right()))?;

    println!(
        "Joined {} ({} rows) with {} ({} rows): {} rows written",
        pair.left(),
        report.left_rows,
        pair.right(),
        report.right_rows,
        report.joined_rows
    );
    Ok(())
}

async fn show_status(ctx: &AppContext) -> Result<()> {
    println!("{:<16} | {:<10}", "Symbol", "Bars");
    println!("{:-<16}-+-{:-<10}", "", "");
    for symbol in &ctx.config.ingest.symbols {
        let count = ctx
            .store
            .count_bars(symbol)
            .await
            .with_context(|| format!("Failed to count bars for {}", symbol))?;
        println!("{:<16} | {:<10}", symbol, count);
    }

    let pair: JoinPair = ctx.join_pair().context("Invalid join pair")?;
    let joined = ctx.store.load_joined(&pair).await.context("Failed to read joined rows")?;
    println!(
        "\nJoined {} / {}: {} rows ({} .. {})",
        pair.left(),
        pair.right(),
        joined.len(),
        joined.first().map(|r| format_timestamp(&r.timestamp)).unwrap_or_else(|| "-".into()),
        joined.last().map(|r| format_timestamp(&r.timestamp)).unwrap_or_else(|| "-".into()),
    );
    Ok(())
}

fn print_outcomes(outcomes: &[IngestOutcome]) {
    println!("{:<16} | {:<8} | {:<8} | {:<10} | {:<10}", "Symbol", "Fetched", "Written", "First", "Last");
    println!("{:-<16}-+-{:-<8}-+-{:-<8}-+-{:-<10}-+-{:-<10}", "", "", "", "", "");

    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => println!(
                "{:<16} | {:<8} | {:<8} | {:<10} | {:<10}",
                outcome.symbol,
                report.fetched,
                report.written,
                report.first.map(|t| t.date().to_string()).unwrap_or_else(|| "-".into()),
                report.last.map(|t| t.date().to_string()).unwrap_or_else(|| "-".into()),
            ),
            Err(e) => println!("{:<16} | FAILED ({}): {}", outcome.symbol, e.stage(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ingest_symbols_and_global_config() {
        let cli = Cli::try_parse_from(["stock-data-viz", "ingest", "XOM", "CL=F", "--config", "viz.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("viz.toml")));
        match cli.command {
            Commands::Ingest { symbols } => assert_eq!(symbols, vec!["XOM", "CL=F"]),
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["stock-data-viz", "serve", "--port", "8080"]).unwrap();
        match cli.command {
            Commands::Serve { bind, port } => {
                assert_eq!(bind, None);
                assert_eq!(port, Some(8080));
            }
            _ => panic!("expected serve"),
        }
    }
}
