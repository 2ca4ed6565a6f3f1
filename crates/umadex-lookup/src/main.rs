// Copyright 2026 Umadex Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use umadex_lookup::rest::{self, AppState};
use umadex_lookup::EventIndex;

#[derive(Parser)]
#[command(
    name = "umadex-lookup",
    about = "Fuzzy event lookup over the umadex JSON corpora",
    version
)]
struct Cli {
    /// Directory holding support_card.json, uma_data.json and career.json.
    /// Falls back to UMADEX_ASSETS, then `assets`.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Listen address (host:port).
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let assets = cli
        .assets
        .or_else(|| std::env::var_os("UMADEX_ASSETS").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("assets"));
    let index = EventIndex::load(&assets)
        .with_context(|| format!("loading corpora from {}", assets.display()))?;

    let state = Arc::new(AppState::new(index, assets));
    rest::serve(&cli.addr, state).await
}
