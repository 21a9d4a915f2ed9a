// tests/pipeline_restart.rs
//
// Restart recovery: LastCheck, the seen set and the memory window survive a
// process restart, and only headlines strictly newer than LastCheck alert.

use chrono::{DateTime, Duration, FixedOffset, TimeZone};

use headline_sentinel::category::CategoryFilter;
use headline_sentinel::entity::EntityFilter;
use headline_sentinel::pipeline::{Outcome, Pipeline, RunMode};
use headline_sentinel::similarity::SimilarityEngine;
use headline_sentinel::state::StateStore;
use headline_sentinel::timestamp::Normalizer;
use headline_sentinel::HeadlineRecord;

fn ist(h: u32, m: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(330 * 60)
        .unwrap()
        .with_ymd_and_hms(2026, 2, 12, h, m, 0)
        .unwrap()
}

fn pipeline(dir: &std::path::Path) -> Pipeline {
    Pipeline::new(
        StateStore::new(dir),
        Normalizer::default(),
        EntityFilter::open(),
        CategoryFilter::default(),
        SimilarityEngine::default(),
        false,
    )
}

#[test]
fn replay_alerts_only_headlines_newer_than_last_check() {
    let dir = tempfile::tempdir().unwrap();
    let t0 = ist(10, 0);
    StateStore::new(dir.path()).save_last_check(t0).unwrap();

    let mut p = pipeline(dir.path());
    assert_eq!(p.mode(), RunMode::Replay);
    assert_eq!(p.last_check(), Some(t0));

    let now = ist(10, 30);
    let newer = HeadlineRecord::new("HAL bags Rs 2,000 crore order from defence ministry", "12 Feb 10:05 AM", "nuvama", "HAL");
    let older = HeadlineRecord::new("Tata Steel completes merger of subsidiary", "12 Feb 09:55 AM", "nuvama", "Tata Steel");
    let relative = HeadlineRecord::new("Wipro launches AI platform for banks", "20 mins ago", "nuvama", "Wipro");
    let undated = HeadlineRecord::new("Coal India declares interim dividend", "yesterday", "nuvama", "Coal India");

    let e = p.evaluate(&newer, now);
    assert_eq!(e.outcome, Outcome::Accepted);
    assert_eq!(e.parsed_time, Some(t0 + Duration::minutes(5)));

    let e = p.evaluate(&older, now);
    assert_eq!(e.outcome, Outcome::Stale);
    assert!(e.outcome.should_archive());

    // 10:30 - 20 min = 10:10 > LastCheck
    assert_eq!(p.evaluate(&relative, now).outcome, Outcome::Accepted);

    // no temporal signal is never replayed
    assert_eq!(p.evaluate(&undated, now).outcome, Outcome::Stale);
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let text = "Infosys signs $1.5 bn deal with Danske Bank";

    {
        let mut p = pipeline(dir.path());
        assert_eq!(p.mode(), RunMode::Baseline);
        let e = p.evaluate(&HeadlineRecord::new(text, "Just Now", "nuvama", "Infosys"), ist(9, 0));
        assert_eq!(e.outcome, Outcome::Baseline);
        p.finish_cycle(ist(9, 0)).unwrap();
    }

    let mut p = pipeline(dir.path());
    assert_eq!(p.mode(), RunMode::Replay);
    assert_eq!(p.seen().len(), 1);
    assert_eq!(p.memory().len(), 1);

    // same text, fresh timestamp, after restart: still an exact repeat
    let again = HeadlineRecord::new(text, "Just Now", "nuvama", "Infosys");
    assert_eq!(p.evaluate(&again, ist(9, 30)).outcome, Outcome::SeenBefore);
}

#[test]
fn shutdown_flush_keeps_last_completed_cycle() {
    let dir = tempfile::tempdir().unwrap();

    // no cycle completed yet: nothing is written
    let p = pipeline(dir.path());
    assert_eq!(p.flush_last_check().unwrap(), None);
    assert_eq!(StateStore::new(dir.path()).load_last_check(), None);

    let mut p = pipeline(dir.path());
    p.evaluate(&HeadlineRecord::new("ITC demerger record date fixed", "Just Now", "nuvama", "ITC"), ist(10, 0));
    p.finish_cycle(ist(10, 0)).unwrap();
    assert_eq!(p.flush_last_check().unwrap(), Some(ist(10, 0)));

    let reloaded = pipeline(dir.path());
    assert_eq!(reloaded.last_check(), Some(ist(10, 0)));
    assert_eq!(reloaded.mode(), RunMode::Replay);
}

#[test]
fn corrupt_state_files_fall_back_to_first_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("last_check_timestamp.json"), "{not json").unwrap();
    std::fs::write(dir.path().join("headlines_seen.json"), "[1, 2,").unwrap();

    let p = pipeline(dir.path());
    assert_eq!(p.mode(), RunMode::Baseline);
    assert!(p.seen().is_empty());
}
