//! # Salesgate CLI
//!
//! Drives the gateway against the in-process engine.
//!
//! ## Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  demo      initialize → status → nextNumber → listRecent → create      │
//! │            → get → delete → terminate → status                         │
//! │  status    initialize → status → companyInfo → terminate               │
//! │  products  product catalogue (no session)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step prints its `ApiResponse` envelope as pretty JSON on stdout.
//! Logs go to stderr; set `RUST_LOG` to change the filter.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use salesgate_core::{LineDraft, Money, TransactionDraft};
use salesgate_engine::MemoryStore;
use salesgate_gateway::{
    ApiResponse, GatewayConfig, GatewayResult, ListQuery, SalesGateway,
};

#[derive(Debug, Parser)]
#[command(name = "salesgate", version, about = "Sales document gateway demo")]
struct Cli {
    /// Path to gateway.toml (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pre-populate the engine with N sales documents in series A / type FS
    #[arg(long, default_value_t = 0)]
    seed: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the end-to-end scenario
    Demo,
    /// Open a session and print its status
    Status,
    /// List known product codes
    Products,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,salesgate=debug")),
        )
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GatewayConfig::load(Some(path.clone()))
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::load_or_default(None),
    };

    let store = MemoryStore::new();
    if cli.seed > 0 {
        let listing = &config.listing;
        store.seed(&listing.default_series, &listing.default_document_type, cli.seed);
        info!(count = cli.seed, "memory engine seeded");
    }

    let gateway = SalesGateway::new(config, Arc::new(store));

    match cli.command {
        Command::Products => print(&ApiResponse::ok(gateway.available_products(), "Products"))?,
        Command::Status => status(&gateway).await?,
        Command::Demo => demo(&gateway).await?,
    }
    Ok(())
}

fn print<T: Serialize>(response: &ApiResponse<T>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

fn report<T: Serialize>(result: GatewayResult<T>, message: &str) -> anyhow::Result<bool> {
    let response = ApiResponse::from_result(result, message);
    print(&response)?;
    Ok(response.success)
}

async fn status(gateway: &SalesGateway) -> anyhow::Result<()> {
    let init = gateway.initialize_from_config().await;
    let message = init.as_ref().map(|o| o.message()).unwrap_or("Initialize");
    report(init, message)?;

    print(&ApiResponse::ok(gateway.status().await, "Status"))?;
    report(gateway.company_info().await, "Company")?;

    let terminated = gateway.terminate().await;
    let message = terminated.as_ref().map(|o| o.message()).unwrap_or("Terminate");
    report(terminated, message)?;
    Ok(())
}

async fn demo(gateway: &SalesGateway) -> anyhow::Result<()> {
    let series = gateway.config().listing.default_series.clone();
    let document_type = gateway.config().listing.default_document_type.clone();

    let init = gateway.initialize_from_config().await;
    let message = init.as_ref().map(|o| o.message()).unwrap_or("Initialize");
    if !report(init, message)? {
        warn!("initialize failed; stopping the demo");
        return Ok(());
    }
    print(&ApiResponse::ok(gateway.status().await, "Status"))?;

    report(
        gateway.next_number(&document_type, &series).await,
        "Next number",
    )?;
    report(
        gateway
            .list_recent(ListQuery::new(&document_type, &series).page(1, 5))
            .await,
        "Recent documents",
    )?;

    let draft = TransactionDraft {
        series: Some(series.clone()),
        document_type: document_type.clone(),
        lines: vec![LineDraft::new("X1", 2.0, Money::from_cents(5000))],
        ..TransactionDraft::default()
    };
    let created = gateway.create(draft).await;
    let number = created.as_ref().ok().map(|c| c.key.number);
    report(created, "Document created")?;

    if let Some(number) = number {
        report(
            gateway.get(&series, &document_type, number, false).await,
            "Document",
        )?;
        report(
            gateway.delete(&series, &document_type, number).await,
            "Delete",
        )?;
    }

    // Empty documents are rejected before reaching the engine
    report(
        gateway
            .create(TransactionDraft {
                series: Some(series.clone()),
                ..TransactionDraft::default()
            })
            .await,
        "Document created",
    )?;

    let terminated = gateway.terminate().await;
    let message = terminated.as_ref().map(|o| o.message()).unwrap_or("Terminate");
    report(terminated, message)?;
    print(&ApiResponse::ok(gateway.status().await, "Status"))?;
    Ok(())
}
