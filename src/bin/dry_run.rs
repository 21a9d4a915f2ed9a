//! Runs one decision pass over a JSON fixture and prints every outcome.
//! Nothing is delivered and no real state is touched.
//!
//! Usage: `sentinel-dry-run <fixture.json>`

use anyhow::{bail, Context, Result};
use std::time::Duration;

use headline_sentinel::category::CategoryFilter;
use headline_sentinel::embedding;
use headline_sentinel::entity::EntityFilter;
use headline_sentinel::pipeline::{Outcome, Pipeline};
use headline_sentinel::similarity::SimilarityEngine;
use headline_sentinel::source::{self, fixture::FixtureSource, SourceAdapter};
use headline_sentinel::state::StateStore;
use headline_sentinel::timestamp::Normalizer;
use headline_sentinel::SentinelConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: sentinel-dry-run <fixture.json>");
    };
    let cfg = SentinelConfig::load()?;

    let state_dir = std::env::temp_dir().join(format!("sentinel-dry-run-{}", std::process::id()));
    let normalizer = Normalizer::with_offset_minutes(cfg.monitor.utc_offset_minutes);
    let entity = EntityFilter::load(&cfg.watchlist.paths);
    let similarity = SimilarityEngine::new(
        entity.watchlist(),
        embedding::from_flag(cfg.similarity.embedding),
        cfg.similarity.threshold,
    );
    let mut pipeline = Pipeline::new(
        StateStore::new(&state_dir),
        normalizer,
        entity,
        CategoryFilter::new(&cfg.categories.suppress),
        similarity,
        true,
    );

    let sources: Vec<Box<dyn SourceAdapter>> = vec![Box::new(FixtureSource::new("fixture", &path))];
    let batch = source::fetch_all(&sources, Duration::from_secs(cfg.monitor.fetch_timeout_secs)).await;
    if let Some(err) = batch.errors.first() {
        bail!("fixture {path}: {}", err.message);
    }

    let now = pipeline.normalizer().now();
    let mut accepted = 0usize;
    for record in &batch.records {
        let eval = pipeline.evaluate(record, now);
        let detail = match &eval.outcome {
            Outcome::CrossSourceDuplicate { score, matched } => {
                format!(" score={score:.2} matched=\"{matched}\"")
            }
            Outcome::CategorySuppressed { category } => format!(" category={category}"),
            _ => String::new(),
        };
        if eval.outcome.should_alert() {
            accepted += 1;
        }
        println!(
            "{:<12} [{}] {}{}",
            eval.outcome.label(),
            record.source,
            record.text,
            detail
        );
    }
    println!(
        "{} record(s), {} would alert, threshold {:.2}",
        batch.records.len(),
        accepted,
        cfg.similarity.threshold
    );

    if state_dir.exists() {
        std::fs::remove_dir_all(&state_dir)
            .with_context(|| format!("removing {}", state_dir.display()))?;
    }
    Ok(())
}
