//! # Canonicalizer
//! Two deterministic text forms per headline:
//!
//! - **conservative**: strips volatile formatting only (live percentage deltas,
//!   dash/colon placeholders, whitespace runs, case). Input to the fingerprint.
//! - **aggressive**: conservative + punctuation/numeral/vocabulary normalization.
//!   Input to the similarity signals.
//!
//! Both are pure and idempotent: `f(f(x)) == f(x)`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};

/// "(+1.25%)", "(-0.4 %)", "(−1.2%)"
static RE_PCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*[+\-−]?\d+(?:\.\d+)?\s*%\s*\)").expect("percentage regex")
});

/// "- :", "–:", "— : " placeholders rendered when a quote is unavailable
static RE_DASH_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-–—]+\s*:\s*").expect("dash-colon regex"));

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static RE_POSSESSIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"['’]s\b").expect("possessive regex"));

static RE_DIGIT_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d),(\d)").expect("digit group regex"));

static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex"));

/// Tokens dropped from company names and headlines alike.
pub(crate) const CORPORATE_SUFFIXES: &[&str] = &["ltd", "limited", "pvt", "inc", "corp", "plc"];

static UNIT_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("cr", "crore"),
        ("crs", "crore"),
        ("crores", "crore"),
        ("mn", "million"),
        ("mln", "million"),
        ("bn", "billion"),
        ("bln", "billion"),
        ("lac", "lakh"),
        ("lacs", "lakh"),
        ("lakhs", "lakh"),
        ("rs", "rupees"),
        ("inr", "rupees"),
    ])
});

static VERB_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("secured", "wins"),
        ("secures", "wins"),
        ("bagged", "wins"),
        ("bags", "wins"),
        ("awarded", "wins"),
        ("won", "wins"),
        ("win", "wins"),
        ("rises", "increases"),
        ("rose", "increases"),
        ("surges", "increases"),
        ("jumps", "increases"),
        ("climbs", "increases"),
        ("gains", "increases"),
        ("falls", "decreases"),
        ("fell", "decreases"),
        ("drops", "decreases"),
        ("declines", "decreases"),
        ("slips", "decreases"),
        ("plunges", "decreases"),
        ("gets", "receives"),
        ("got", "receives"),
        ("obtains", "receives"),
        ("received", "receives"),
    ])
});

/// Multi-token spellings collapsed to one token (applied after the token maps).
const PHRASES: &[(&[&str], &str)] = &[
    (&["us", "fda"], "usfda"),
    (&["establishment", "inspection", "report"], "eir"),
];

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "from", "with", "its", "this", "that", "has", "have", "had", "will",
        "after", "over", "into", "than", "via", "per", "amid", "about", "not", "but", "are",
        "was", "were", "been", "his", "her", "their", "our", "all", "new", "says", "said",
    ]
    .into_iter()
    .collect()
});

/// Conservative form: volatile quote deltas and placeholders removed, lowercase.
pub fn conservative(text: &str) -> String {
    let mut cur = conservative_pass(text);
    // A removal can expose another match, e.g. nested "((+1.2%)+1.2%)".
    // Every changing pass removes a quote delta or a dash, so this ends.
    loop {
        let next = conservative_pass(&cur);
        if next == cur {
            return cur;
        }
        cur = next;
    }
}

fn conservative_pass(text: &str) -> String {
    let out = RE_PCT.replace_all(text, "");
    let out = RE_DASH_COLON.replace_all(&out, ": ");
    let out = RE_WS.replace_all(&out, " ");
    out.trim().to_lowercase()
}

/// Aggressive form used for similarity scoring.
pub fn aggressive(text: &str) -> String {
    let mut s = conservative(text)
        .replace('\u{a0}', " ")
        .replace('₹', " rupees ");
    s = RE_POSSESSIVE.replace_all(&s, "").into_owned();
    // "1,23,456" needs repeated passes: each match consumes the digit after the comma.
    loop {
        let next = RE_DIGIT_GROUP.replace_all(&s, "${1}${2}").into_owned();
        if next == s {
            break;
        }
        s = next;
    }
    let s = strip_punctuation(&s);

    let tokens: Vec<&str> = s
        .split_whitespace()
        .filter(|t| !CORPORATE_SUFFIXES.contains(t))
        .map(|t| UNIT_MAP.get(t).copied().unwrap_or(t))
        .map(|t| VERB_MAP.get(t).copied().unwrap_or(t))
        .collect();

    collapse_phrases(&tokens).join(" ")
}

/// Drops apostrophes and non-decimal dots, turns every other punctuation or
/// symbol into a space. A dot between two digits is a decimal point and stays.
fn strip_punctuation(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_alphanumeric() || ch.is_whitespace() {
            out.push(ch);
            continue;
        }
        let between_digits = i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());
        match ch {
            '.' if between_digits => out.push('.'),
            '.' | '\'' | '’' | '‘' | '`' => {}
            _ => out.push(' '),
        }
    }
    out
}

fn collapse_phrases<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    'scan: while i < tokens.len() {
        for (phrase, replacement) in PHRASES {
            if tokens[i..].starts_with(phrase) {
                out.push(*replacement);
                i += phrase.len();
                continue 'scan;
            }
        }
        out.push(tokens[i]);
        i += 1;
    }
    out
}

/// Content words of an aggressive canonical form: stop words and tokens of
/// length <= 2 removed.
pub fn content_tokens(aggressive: &str) -> BTreeSet<String> {
    aggressive
        .split_whitespace()
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Positive numeric literals of an aggressive canonical form (grouping
/// separators are already gone), deduplicated by value.
pub fn numbers(aggressive: &str) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    for m in RE_NUMBER.find_iter(aggressive) {
        if let Ok(v) = m.as_str().parse::<f64>() {
            if v > 0.0 && !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}
