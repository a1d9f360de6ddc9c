//! Recomputes the stored score of every company and repairs stale ones.
//!
//! Usage: `rescore_companies [--dry-run]`. Uses the same environment as the
//! API server (`STORE_BACKEND`, `DATABASE_URL`, `REST_STORE_URL`, ...).

use rust_pipeline_api::config::Config;
use rust_pipeline_api::integrations::connect_record_store;
use rust_pipeline_api::rescore::rescore_collection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let dry_run = std::env::args().skip(1).any(|arg| arg == "--dry-run");

    let config = Config::from_env()?;
    let records = connect_record_store(&config).await?;

    tracing::info!(
        "Rescoring collection '{}'{}",
        config.collection,
        if dry_run { " (dry run)" } else { "" }
    );

    let summary = rescore_collection(records.as_ref(), &config.collection, dry_run).await?;

    println!("Scanned:    {}", summary.scanned);
    println!("Consistent: {}", summary.consistent);
    println!(
        "{} {}",
        if dry_run { "Stale:     " } else { "Rescored:  " },
        summary.rescored
    );
    println!("Skipped:    {}", summary.skipped);
    println!("Failed:     {}", summary.failed.len());

    if !summary.failed.is_empty() {
        anyhow::bail!("{} companies could not be rescored", summary.failed.len());
    }

    Ok(())
}
