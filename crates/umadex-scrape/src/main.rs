// Copyright 2026 Umadex Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use umadex_scrape::config::{ScrapeConfig, Server};
use umadex_scrape::pipeline::Pipeline;
use umadex_scrape::progress::{self, Category, ProgressEventKind, Reporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum What {
    #[value(alias = "uma")]
    Characters,
    Supports,
    Career,
    Races,
    All,
}

impl What {
    fn categories(self) -> Vec<Category> {
        match self {
            What::Characters => vec![Category::Characters],
            What::Supports => vec![Category::Supports],
            What::Career => vec![Category::Career],
            What::Races => vec![Category::Races],
            What::All => vec![
                Category::Characters,
                Category::Supports,
                Category::Career,
                Category::Races,
            ],
        }
    }
}

#[derive(Parser)]
#[command(
    name = "umadex-scrape",
    about = "Scrape GameTora Umamusume characters, support cards, career events and races into JSON",
    version
)]
struct Cli {
    /// What to scrape.
    #[arg(long, value_enum, default_value = "all")]
    what: What,

    /// Game server whose data the site shows (overrides UMADEX_SERVER).
    #[arg(long, value_enum)]
    server: Option<Server>,

    /// Show the browser window.
    #[arg(long)]
    headful: bool,

    #[arg(long)]
    out_uma: Option<PathBuf>,

    #[arg(long)]
    out_supports: Option<PathBuf>,

    #[arg(long)]
    out_support_hints: Option<PathBuf>,

    #[arg(long)]
    out_career: Option<PathBuf>,

    #[arg(long)]
    out_races: Option<PathBuf>,

    /// Directory for support card thumbnails.
    #[arg(long)]
    thumb_dir: Option<PathBuf>,

    /// Retries per item after the first attempt.
    #[arg(long)]
    retries: Option<u32>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> ScrapeConfig {
        let mut cfg = ScrapeConfig::from_env();
        if let Some(server) = self.server {
            cfg.server = server;
        }
        if self.headful {
            cfg.browser.headless = false;
        }
        let outputs = &mut cfg.outputs;
        let overrides = [
            (&self.out_uma, &mut outputs.uma),
            (&self.out_supports, &mut outputs.supports),
            (&self.out_support_hints, &mut outputs.support_hints),
            (&self.out_career, &mut outputs.career),
            (&self.out_races, &mut outputs.races),
            (&self.thumb_dir, &mut outputs.thumb_dir),
        ];
        for (flag, slot) in overrides {
            if let Some(path) = flag {
                *slot = path.clone();
            }
        }
        if let Some(n) = self.retries {
            cfg.retry.max_retries = n;
        }
        cfg
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config();
    tracing::info!(server = ?config.server, headless = config.browser.headless, "umadex-scrape starting");

    let (tx, mut rx) = progress::channel();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => match &ev.event {
                    ProgressEventKind::ItemSkipped { .. } | ProgressEventKind::Warning { .. } => {
                        eprintln!("{}", ev.event)
                    }
                    _ => println!("{}", ev.event),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    eprintln!("progress: {n} events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let run_id = chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string();
    let mut pipeline = Pipeline::new(config, Reporter::new(Some(tx), run_id))?;

    let mut failure = None;
    for category in cli.what.categories() {
        if let Err(e) = pipeline.run(category).await {
            failure = Some((category, e));
            break;
        }
    }

    // Dropping the pipeline closes the channel so the printer drains and exits.
    drop(pipeline);
    let _ = printer.await;

    if let Some((category, e)) = failure {
        eprintln!("  Error: {category} aborted ({}): {e}", e.kind());
        std::process::exit(2);
    }
    Ok(())
}
