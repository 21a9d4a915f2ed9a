//! # Timestamp Normalizer
//! Resolves the timestamp strings rendered by news sites into absolute times in
//! one fixed reference timezone (IST, UTC+05:30, unless configured otherwise).
//!
//! Recognized forms, in priority order:
//! 1. "Just Now"
//! 2. "<N> <unit> ago" with unit in minutes or hours ("15 mins ago", "4m ago")
//! 3. "03 Nov 08:26 AM" (no year; the reference year is attached)
//! 4. "4m ago | 07:42 PM 12-02-2026" (composite; the absolute part wins)
//! 5. RFC 3339 / RFC 2822
//!
//! Anything else is unparseable (`None`). Parsing never panics.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::AbsoluteTime;

/// IST offset in minutes.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

static RE_JUST_NOW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^just\s+now$").expect("just-now regex"));

static RE_RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,9})\s*(m|min|mins|minute|minutes|h|hr|hrs|hour|hours)\s+ago$")
        .expect("relative regex")
});

static RE_DAY_MONTH_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})\s+([a-z]{3})\s+(\d{1,2}):(\d{2})\s*([ap]m)$")
        .expect("day-month regex")
});

static RE_TIME_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*([ap]m)\s+(\d{1,2})-(\d{1,2})-(\d{4})")
        .expect("time-date regex")
});

static RE_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2})-(\d{1,2})-(\d{4})\s+(\d{1,2}):(\d{2})\s*([ap]m)")
        .expect("date-time regex")
});

/// Converts source timestamps into `AbsoluteTime` in a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    offset: FixedOffset,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_offset_minutes(DEFAULT_UTC_OFFSET_MINUTES)
    }
}

impl Normalizer {
    /// Out-of-range offsets fall back to IST.
    pub fn with_offset_minutes(minutes: i32) -> Self {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .or_else(|| FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60))
            .unwrap_or(Utc.fix());
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Wall-clock now in the reference timezone.
    pub fn now(&self) -> AbsoluteTime {
        Utc::now().with_timezone(&self.offset)
    }

    /// Resolve `raw` against the reference time `now`.
    pub fn parse(&self, raw: &str, now: AbsoluteTime) -> Option<AbsoluteTime> {
        let now = now.with_timezone(&self.offset);
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if RE_JUST_NOW.is_match(s) {
            return Some(now);
        }
        if let Some(t) = parse_relative(s, now) {
            return Some(t);
        }
        if let Some(t) = self.parse_day_month(s, now) {
            return Some(t);
        }
        if s.contains('|') {
            return self.parse_composite(s, now);
        }
        if let Ok(t) = DateTime::parse_from_rfc3339(s) {
            return Some(t.with_timezone(&self.offset));
        }
        if let Ok(t) = DateTime::parse_from_rfc2822(s) {
            return Some(t.with_timezone(&self.offset));
        }

        tracing::debug!(target: "timestamp", raw = %s, "unparseable timestamp");
        None
    }

    /// "03 Nov 08:26 AM" → reference year attached; rolls back a year if that
    /// would put the headline more than a day in the future, or if the date
    /// does not exist in the reference year (29 Feb).
    fn parse_day_month(&self, s: &str, now: AbsoluteTime) -> Option<AbsoluteTime> {
        let caps = RE_DAY_MONTH_TIME.captures(s)?;
        let rest = format!(
            "{} {} {}:{} {}",
            &caps[1],
            &caps[2],
            &caps[3],
            &caps[4],
            caps[5].to_ascii_uppercase()
        );
        let with_year = |year: i32| {
            NaiveDateTime::parse_from_str(&format!("{year} {rest}"), "%Y %d %b %I:%M %p")
                .ok()
                .and_then(|naive| self.offset.from_local_datetime(&naive).single())
        };

        let Some(candidate) = with_year(now.year()) else {
            return with_year(now.year() - 1);
        };
        if candidate > now + Duration::days(1) {
            return with_year(now.year() - 1).or(Some(candidate));
        }
        Some(candidate)
    }

    /// Composite cross-source form. The absolute day/month/year part is preferred;
    /// the relative part is only used when no absolute part is present.
    fn parse_composite(&self, s: &str, now: AbsoluteTime) -> Option<AbsoluteTime> {
        if let Some(c) = RE_TIME_DATE.captures(s) {
            return self.from_parts(&c[4], &c[5], &c[6], &c[1], &c[2], &c[3]);
        }
        if let Some(c) = RE_DATE_TIME.captures(s) {
            return self.from_parts(&c[1], &c[2], &c[3], &c[4], &c[5], &c[6]);
        }
        s.split('|')
            .map(str::trim)
            .find_map(|part| parse_relative(part, now))
    }

    fn from_parts(
        &self,
        day: &str,
        month: &str,
        year: &str,
        hour: &str,
        minute: &str,
        meridiem: &str,
    ) -> Option<AbsoluteTime> {
        let text = format!(
            "{day}-{month}-{year} {hour}:{minute} {}",
            meridiem.to_ascii_uppercase()
        );
        let naive = NaiveDateTime::parse_from_str(&text, "%d-%m-%Y %I:%M %p").ok()?;
        self.offset.from_local_datetime(&naive).single()
    }

    /// Archive rendering: ("03 Nov 08:26 AM", "2025-11-03").
    pub fn archive_format(&self, t: AbsoluteTime) -> (String, String) {
        let t = t.with_timezone(&self.offset);
        (
            t.format("%d %b %I:%M %p").to_string(),
            t.format("%Y-%m-%d").to_string(),
        )
    }
}

fn parse_relative(s: &str, now: AbsoluteTime) -> Option<AbsoluteTime> {
    let caps = RE_RELATIVE.captures(s)?;
    let amount: i64 = caps[1].parse().ok()?;
    let unit = caps[2].to_ascii_lowercase();
    let delta = if unit.starts_with('m') {
        Duration::try_minutes(amount)?
    } else {
        Duration::try_hours(amount)?
    };
    now.checked_sub_signed(delta)
}

/// True when `line` is something the normalizer would accept as a timestamp line.
/// Used by the page-text adapter to locate headline/timestamp pairs.
pub fn looks_like_timestamp(line: &str) -> bool {
    let s = line.trim();
    if s.is_empty() || s.chars().count() > 64 {
        return false;
    }
    RE_JUST_NOW.is_match(s)
        || RE_RELATIVE.is_match(s)
        || RE_DAY_MONTH_TIME.is_match(s)
        || (s.contains('|') && (RE_TIME_DATE.is_match(s) || RE_DATE_TIME.is_match(s)))
}
