// tests/timestamp_scenarios.rs
use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use headline_sentinel::timestamp::{looks_like_timestamp, Normalizer};

fn ist(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(330 * 60)
        .unwrap()
        .with_ymd_and_hms(y, mo, d, h, mi, 0)
        .unwrap()
}

#[test]
fn site_formats_resolve_against_reference_time() {
    let n = Normalizer::default();
    let now = ist(2026, 2, 12, 19, 46);

    assert_eq!(n.parse("Just Now", now), Some(now));
    assert_eq!(n.parse("15 mins ago", now), Some(now - Duration::minutes(15)));
    assert_eq!(n.parse("2 hours ago", now), Some(now - Duration::hours(2)));
    assert_eq!(n.parse("03 Feb 08:26 AM", now), Some(ist(2026, 2, 3, 8, 26)));
    assert_eq!(
        n.parse("4m ago | 07:42 PM 12-02-2026", now),
        Some(ist(2026, 2, 12, 19, 42))
    );
}

#[test]
fn year_rolls_back_for_december_headlines_seen_in_january() {
    let n = Normalizer::default();
    let now = ist(2026, 1, 2, 9, 0);
    assert_eq!(n.parse("31 Dec 11:15 PM", now), Some(ist(2025, 12, 31, 23, 15)));
}

#[test]
fn utc_inputs_are_moved_into_the_reference_zone() {
    let n = Normalizer::default();
    let now = ist(2026, 2, 12, 12, 0);
    let t = n.parse("2026-02-12T04:30:00Z", now).unwrap();
    assert_eq!(t, ist(2026, 2, 12, 10, 0));
    assert_eq!(t.offset().local_minus_utc(), 330 * 60);
}

#[test]
fn garbage_is_unparseable_not_a_panic() {
    let n = Normalizer::default();
    let now = ist(2026, 2, 12, 12, 0);
    for raw in ["", "   ", "yesterday", "99 Foo 25:99 XM", "| |", "999999999999 mins ago"] {
        assert_eq!(n.parse(raw, now), None, "{raw:?}");
    }
}

#[test]
fn timestamp_line_detection() {
    assert!(looks_like_timestamp("Just Now"));
    assert!(looks_like_timestamp("4m ago"));
    assert!(looks_like_timestamp("03 Nov 08:26 AM"));
    assert!(!looks_like_timestamp("Reliance Industries shares rise 2%"));
    assert!(!looks_like_timestamp(""));
}
