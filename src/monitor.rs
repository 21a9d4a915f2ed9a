//! Cycle orchestration: fetch → evaluate → archive → deliver → persist, on a
//! fixed interval, with an error backoff and a LastCheck flush on shutdown.

use anyhow::{anyhow, Result};
use metrics::{counter, gauge};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;

use crate::archive::{ArchiveEntry, JsonArchive};
use crate::category::CategoryFilter;
use crate::config::{MonitorSettings, SentinelConfig};
use crate::embedding;
use crate::entity::EntityFilter;
use crate::metrics::{ALERTS_TOTAL, CYCLE_LAST_RUN_TS, DELIVERY_FAILURES_TOTAL};
use crate::notify::NotifierMux;
use crate::pipeline::{Evaluation, Pipeline};
use crate::similarity::SimilarityEngine;
use crate::source::{self, FetchBatch, SourceAdapter};
use crate::state::StateStore;
use crate::timestamp::Normalizer;
use crate::types::{preview, AbsoluteTime, HeadlineRecord};

pub const STARTUP_NOTICE: &str = "🔄 Monitor restarted. Only new headlines will be sent.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub fetched: usize,
    pub archived: usize,
    pub alerted: usize,
    pub delivery_failures: usize,
    pub source_errors: usize,
    /// Outcome label → count, for every record that was not alerted.
    pub dropped: BTreeMap<&'static str, usize>,
    /// False when nothing was fetched and state was left untouched.
    pub persisted: bool,
}

pub struct Monitor {
    pipeline: Pipeline,
    sources: Vec<Box<dyn SourceAdapter>>,
    notifier: NotifierMux,
    archive: JsonArchive,
    interval: Duration,
    error_backoff: Duration,
    fetch_timeout: Duration,
    deliver_pause: Duration,
    startup_notice: bool,
}

impl Monitor {
    pub fn new(
        pipeline: Pipeline,
        sources: Vec<Box<dyn SourceAdapter>>,
        notifier: NotifierMux,
        archive: JsonArchive,
        settings: &MonitorSettings,
    ) -> Self {
        Self {
            pipeline,
            sources,
            notifier,
            archive,
            interval: Duration::from_secs(settings.interval_secs.max(1)),
            error_backoff: Duration::from_secs(settings.error_backoff_secs.max(1)),
            fetch_timeout: Duration::from_secs(settings.fetch_timeout_secs.max(1)),
            deliver_pause: Duration::from_millis(settings.deliver_pause_ms),
            startup_notice: settings.startup_notice,
        }
    }

    /// Everything the service needs, built once from configuration.
    pub fn from_config(cfg: &SentinelConfig, notifier: NotifierMux) -> Self {
        let m = &cfg.monitor;
        let normalizer = Normalizer::with_offset_minutes(m.utc_offset_minutes);
        let store = StateStore::new(&m.state_dir);
        let entity = EntityFilter::load(&cfg.watchlist.paths);
        let similarity = SimilarityEngine::new(
            entity.watchlist(),
            embedding::from_flag(cfg.similarity.embedding),
            cfg.similarity.threshold,
        );
        let categories = CategoryFilter::new(&cfg.categories.suppress);
        let pipeline = Pipeline::new(
            store,
            normalizer,
            entity,
            categories,
            similarity,
            m.first_run_alerts,
        );
        let sources = source::build_sources(
            &cfg.sources,
            Duration::from_secs(m.fetch_timeout_secs.max(1)),
        );
        if sources.is_empty() {
            tracing::warn!(target: "monitor", "no enabled sources; cycles will fetch nothing");
        }
        let archive = JsonArchive::in_dir(&m.state_dir);
        Self::new(pipeline, sources, notifier, archive, m)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn archive(&self) -> &JsonArchive {
        &self.archive
    }

    fn archive_entry(
        &self,
        record: &HeadlineRecord,
        eval: &Evaluation,
        now: AbsoluteTime,
    ) -> ArchiveEntry {
        let normalizer = self.pipeline.normalizer();
        let (timestamp, date) = match eval.parsed_time {
            Some(t) => normalizer.archive_format(t),
            None => (record.raw_timestamp.clone(), normalizer.archive_format(now).1),
        };
        ArchiveEntry {
            headline: record.text.clone(),
            timestamp,
            date,
            source: record.source.clone(),
            entity: record.entity_id.clone(),
        }
    }

    /// One full cycle at reference time `now`.
    ///
    /// Fails only when every source failed; nothing is persisted then, so
    /// LastCheck keeps pointing at the last cycle that actually saw data.
    pub async fn run_cycle(&mut self, now: AbsoluteTime) -> Result<CycleReport> {
        let batch = source::fetch_all(&self.sources, self.fetch_timeout).await;
        self.process_batch(batch, now).await
    }

    async fn process_batch(&mut self, batch: FetchBatch, now: AbsoluteTime) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        report.fetched = batch.records.len();
        report.source_errors = batch.errors.len();

        for err in &batch.errors {
            self.pipeline
                .store()
                .record_error("scraping", &err.message, Some(err.source.clone()), now);
        }
        if !self.sources.is_empty() && batch.errors.len() == self.sources.len() {
            return Err(anyhow!("all {} source(s) failed", batch.errors.len()));
        }
        if batch.records.is_empty() {
            tracing::info!(target: "monitor", "no headlines fetched");
            return Ok(report);
        }

        for record in &batch.records {
            let eval = self.pipeline.evaluate(record, now);

            if eval.outcome.should_archive() {
                let entry = self.archive_entry(record, &eval, now);
                match self.archive.append(entry) {
                    Ok(()) => report.archived += 1,
                    Err(e) => {
                        let msg = format!("{e:#}");
                        tracing::warn!(target: "state", error = %msg, "archive append failed");
                        self.pipeline.store().record_error(
                            "database_save",
                            &msg,
                            Some(preview(&record.text, 100)),
                            now,
                        );
                    }
                }
            }

            if !eval.outcome.should_alert() {
                *report.dropped.entry(eval.outcome.label()).or_default() += 1;
                continue;
            }

            tracing::info!(target: "monitor", source = %record.source, "sending: {}", preview(&record.text, 70));
            if self
                .notifier
                .deliver(&record.text, &record.source, &record.entity_id)
                .await
            {
                report.alerted += 1;
                counter!(ALERTS_TOTAL).increment(1);
                if !self.deliver_pause.is_zero() {
                    tokio::time::sleep(self.deliver_pause).await;
                }
            } else {
                report.delivery_failures += 1;
                counter!(DELIVERY_FAILURES_TOTAL).increment(1);
                self.pipeline.store().record_error(
                    "delivery",
                    "no notifier channel accepted the alert",
                    Some(preview(&record.text, 100)),
                    now,
                );
            }
        }

        if let Err(e) = self.pipeline.finish_cycle(now) {
            tracing::warn!(target: "monitor", error = %format!("{e:#}"), "cycle state not fully persisted");
        }
        report.persisted = true;
        gauge!(CYCLE_LAST_RUN_TS).set(now.timestamp() as f64);

        tracing::info!(
            target: "monitor",
            fetched = report.fetched,
            archived = report.archived,
            alerted = report.alerted,
            failed = report.delivery_failures,
            dropped = ?report.dropped,
            "cycle done"
        );
        Ok(report)
    }

    /// Startup notice (if enabled), then cycles until `shutdown` flips to true
    /// or its sender goes away. A shutdown during the fetch skips the rest of
    /// that cycle. LastCheck of the last completed cycle is flushed before
    /// returning.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if self.startup_notice && !self.notifier.notice(STARTUP_NOTICE).await {
            self.pipeline
                .record_error("startup_notice", "startup notice not delivered", None);
        }

        let mut cycle: u64 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            cycle += 1;
            let now = self.pipeline.normalizer().now();
            let batch = tokio::select! {
                batch = source::fetch_all(&self.sources, self.fetch_timeout) => batch,
                _ = shutdown_requested(&mut shutdown) => {
                    tracing::info!(target: "monitor", cycle, "shutdown during fetch; cycle skipped");
                    break;
                }
            };
            let delay = match self.process_batch(batch, now).await {
                Ok(_) => self.interval,
                Err(e) => {
                    let msg = format!("{e:#}");
                    tracing::warn!(target: "monitor", cycle, error = %msg, backoff_secs = self.error_backoff.as_secs(), "cycle failed; backing off");
                    self.pipeline
                        .record_error("main_loop", &msg, Some(format!("cycle #{cycle}")));
                    self.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        match self.pipeline.flush_last_check()? {
            Some(t) => {
                tracing::info!(target: "monitor", last_check = %t.to_rfc3339(), "stopped; last check flushed")
            }
            None => tracing::info!(target: "monitor", "stopped before any cycle completed"),
        }
        Ok(())
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
