//! # Decision pipeline
//! Evaluates one record at a time, in source order, against exclusively owned
//! state. Per record:
//!
//! 1. resolve the timestamp (pre-parsed time wins over the raw string)
//! 2. layer A: drop exact repeats (the fingerprint is recorded immediately)
//! 3. entity filter: drop records outside the watchlist
//! 4. run mode / recency: baseline and stale records are archived, not alerted
//! 5. category filter: suppressed categories are archived, not alerted
//! 6. layer B: drop cross-source near-duplicates
//! 7. accept: alert and remember in the memory window
//!
//! Run modes: `Baseline` on the very first run (no LastCheck on disk),
//! `Replay` on the first cycle after a restart (alert only what is strictly
//! newer than the previous LastCheck), `Steady` afterwards.

use anyhow::{anyhow, Result};
use metrics::counter;

use crate::category::CategoryFilter;
use crate::dedup::SeenSet;
use crate::entity::EntityFilter;
use crate::metrics::{DROPPED_TOTAL, UNPARSEABLE_TIMESTAMPS_TOTAL};
use crate::similarity::SimilarityEngine;
use crate::state::{MemoryWindow, StateStore};
use crate::timestamp::Normalizer;
use crate::types::{preview, AbsoluteTime, HeadlineRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Baseline,
    Replay,
    Steady,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Blank headline text.
    Empty,
    SeenBefore,
    EntityFiltered,
    /// First-run seeding.
    Baseline,
    /// Not strictly newer than LastCheck (or unparseable during replay).
    Stale,
    CategorySuppressed { category: String },
    CrossSourceDuplicate { score: f32, matched: String },
    Accepted,
}

impl Outcome {
    /// Everything past layer A and the entity filter goes to the archive.
    pub fn should_archive(&self) -> bool {
        !matches!(
            self,
            Outcome::Empty | Outcome::SeenBefore | Outcome::EntityFiltered
        )
    }

    pub fn should_alert(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Empty => "empty",
            Outcome::SeenBefore => "seen",
            Outcome::EntityFiltered => "entity",
            Outcome::Baseline => "baseline",
            Outcome::Stale => "stale",
            Outcome::CategorySuppressed { .. } => "category",
            Outcome::CrossSourceDuplicate { .. } => "cross_source",
            Outcome::Accepted => "accepted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub parsed_time: Option<AbsoluteTime>,
}

pub struct Pipeline {
    normalizer: Normalizer,
    store: StateStore,
    seen: SeenSet,
    memory: MemoryWindow,
    entity: EntityFilter,
    categories: CategoryFilter,
    similarity: SimilarityEngine,
    last_check: Option<AbsoluteTime>,
    mode: RunMode,
}

impl Pipeline {
    /// Loads the seen set, memory window and LastCheck from `store` and picks
    /// the run mode from them.
    pub fn new(
        store: StateStore,
        normalizer: Normalizer,
        entity: EntityFilter,
        categories: CategoryFilter,
        similarity: SimilarityEngine,
        first_run_alerts: bool,
    ) -> Self {
        let seen = store.load_seen();
        let memory = store.load_memory();
        let last_check = store.load_last_check();
        let mode = match last_check {
            Some(_) => RunMode::Replay,
            None if first_run_alerts => RunMode::Steady,
            None => RunMode::Baseline,
        };

        let now = normalizer.now();
        for e in entity.load_errors() {
            store.record_error("watchlist_load", e, None, now);
        }

        match last_check {
            Some(t) => tracing::info!(
                target: "monitor",
                last_check = %t.to_rfc3339(),
                downtime_secs = (now - t).num_seconds(),
                "restart detected; replaying headlines newer than last check"
            ),
            None => tracing::info!(target: "monitor", ?mode, "first run; no last check on disk"),
        }
        tracing::info!(
            target: "monitor",
            seen = seen.len(),
            memory = memory.len(),
            watchlist_active = entity.is_active(),
            threshold = similarity.threshold(),
            "pipeline state loaded"
        );

        Self {
            normalizer,
            store,
            seen,
            memory,
            entity,
            categories,
            similarity,
            last_check,
            mode,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn last_check(&self) -> Option<AbsoluteTime> {
        self.last_check
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn memory(&self) -> &MemoryWindow {
        &self.memory
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    fn resolve_time(&self, record: &HeadlineRecord, now: AbsoluteTime) -> Option<AbsoluteTime> {
        let offset = self.normalizer.offset();
        record
            .parsed_time
            .map(|t| t.with_timezone(&offset))
            .or_else(|| self.normalizer.parse(&record.raw_timestamp, now))
    }

    /// Recency gate. `true` means the record may still alert.
    fn is_fresh(&self, parsed: Option<AbsoluteTime>) -> bool {
        match (self.mode, self.last_check, parsed) {
            (_, None, _) => true,
            (_, Some(lc), Some(t)) => t > lc,
            // no temporal signal: never replayed, but not held back in steady state
            (RunMode::Replay, Some(_), None) => false,
            (_, Some(_), None) => true,
        }
    }

    pub fn evaluate(&mut self, record: &HeadlineRecord, now: AbsoluteTime) -> Evaluation {
        let parsed_time = self.resolve_time(record, now);
        let outcome = self.decide(record, parsed_time, now);

        if outcome.should_alert() {
            tracing::debug!(target: "pipeline", source = %record.source, headline = %preview(&record.text, 70), "accepted");
        } else {
            counter!(DROPPED_TOTAL, "reason" => outcome.label()).increment(1);
            tracing::debug!(
                target: "pipeline",
                source = %record.source,
                reason = outcome.label(),
                headline = %preview(&record.text, 70),
                "not alerted"
            );
        }
        Evaluation {
            outcome,
            parsed_time,
        }
    }

    fn decide(
        &mut self,
        record: &HeadlineRecord,
        parsed_time: Option<AbsoluteTime>,
        now: AbsoluteTime,
    ) -> Outcome {
        if record.text.trim().is_empty() {
            return Outcome::Empty;
        }
        if parsed_time.is_none() {
            counter!(UNPARSEABLE_TIMESTAMPS_TOTAL).increment(1);
            tracing::debug!(target: "pipeline", raw = %record.raw_timestamp, "no temporal signal");
        }

        if !self.seen.check(&record.text) {
            return Outcome::SeenBefore;
        }
        if !self.entity.matches(&record.entity_id) {
            return Outcome::EntityFiltered;
        }

        if self.mode == RunMode::Baseline {
            self.remember(record, now);
            return Outcome::Baseline;
        }
        if !self.is_fresh(parsed_time) {
            return Outcome::Stale;
        }

        if let Some(cat) = self
            .categories
            .suppressed_category(&record.text, &record.category)
        {
            return Outcome::CategorySuppressed {
                category: cat.to_string(),
            };
        }

        let verdict =
            self.similarity
                .is_duplicate(&record.text, &record.source, self.memory.entries());
        if verdict.is_duplicate {
            return Outcome::CrossSourceDuplicate {
                score: verdict.best_score,
                matched: verdict.best_match.unwrap_or_default(),
            };
        }

        self.remember(record, now);
        Outcome::Accepted
    }

    fn remember(&mut self, record: &HeadlineRecord, now: AbsoluteTime) {
        let entry =
            self.similarity
                .memory_entry(&record.text, &record.source, &record.entity_id, now);
        self.memory.push(entry);
    }

    /// Persist the seen set, the pruned memory window and LastCheck = `now`,
    /// then switch to steady state. Every store is attempted; failures are
    /// logged and recorded in the error log.
    pub fn finish_cycle(&mut self, now: AbsoluteTime) -> Result<()> {
        let mut failures = Vec::new();
        if let Err(e) = self.store.save_seen(&self.seen) {
            failures.push(("save_seen", e));
        }
        if let Err(e) = self.store.save_memory(&mut self.memory, now) {
            failures.push(("save_memory", e));
        }
        self.last_check = Some(now);
        if let Err(e) = self.store.save_last_check(now) {
            failures.push(("save_last_check", e));
        }
        if self.mode != RunMode::Steady {
            tracing::info!(target: "monitor", from = ?self.mode, "switching to steady state");
        }
        self.mode = RunMode::Steady;

        let count = failures.len();
        for (kind, e) in &failures {
            let msg = format!("{e:#}");
            tracing::warn!(target: "state", kind, error = %msg, "state save failed");
            self.store.record_error(kind, &msg, None, now);
        }
        match count {
            0 => Ok(()),
            n => Err(anyhow!("{n} state store(s) failed to save")),
        }
    }

    /// Shutdown path: re-persist the end of the last completed cycle. Nothing
    /// is written when no cycle ever completed, so an outage before shutdown
    /// is still replayed after the restart.
    pub fn flush_last_check(&self) -> Result<Option<AbsoluteTime>> {
        match self.last_check {
            Some(t) => {
                self.store.save_last_check(t)?;
                Ok(Some(t))
            }
            None => Ok(None),
        }
    }

    pub fn record_error(&self, kind: &str, message: &str, details: Option<String>) {
        self.store
            .record_error(kind, message, details, self.normalizer.now());
    }
}
