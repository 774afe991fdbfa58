mod config;
mod models;
mod pipeline;
mod scrapers;

use anyhow::Context;
use clap::Parser;
use config::Cli;
use scrapers::HttpFetcher;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    info!("🏠 Loupan Crawler - Shanghai new homes");
    info!("Base URL: {}, output: {}", cli.base_url, cli.output.display());

    let fetcher = HttpFetcher::new(cli.fetch_settings())?;
    let settings = cli.crawl_settings();

    let report = pipeline::run(&fetcher, &settings)
        .await
        .context("Crawl failed")?;

    if let Some(path) = &cli.raw_dump {
        let json = serde_json::to_string_pretty(&report.records)?;
        write_file(path, json).await?;
        info!("💾 Saved raw records to {}", path.display());
    }

    let module = pipeline::emit(&report.records, chrono::Utc::now())?;
    write_file(&cli.output, module).await?;

    for outcome in &report.outcomes {
        info!(
            "  {:<12} {:?}: {} pages ({} failed), {} listings",
            outcome.path, outcome.reason, outcome.pages_visited, outcome.pages_failed, outcome.records
        );
    }
    info!(
        "{} pages fetched, {} failed, {} listings parsed, {} without a name",
        report.pages_fetched, report.pages_failed, report.parsed, report.unnamed
    );
    info!(
        "✅ Wrote {} listings to {} ({} duplicates removed, {} outside Shanghai dropped)",
        report.records.len(),
        cli.output.display(),
        report.duplicates,
        report.out_of_scope
    );

    Ok(())
}

async fn write_file(path: &Path, contents: String) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
