//! Category filter: suppresses alerting (never archiving) for configured
//! categories. `results` also recognizes earnings headlines by content, since
//! source category tags are frequently missing.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub const RESULTS: &str = "results";

static RE_QUARTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bq[1-4]\b").expect("quarter regex"));

const EARNINGS_KEYWORDS: &[&str] = &[
    "net profit",
    "net loss",
    "revenue",
    "ebitda",
    "rupees vs",
    "yoy",
    "qoq",
    "est ",
    "margin",
    "topline",
    "bottomline",
    "bottom line",
    "top line",
    "profit after tax",
    "pat ",
    "sales ",
];

static RESULTS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bnet profit\b.*\brupees\b",
        r"\bnet loss\b.*\brupees\b",
        r"\brevenue\b.*\brupees\b.*\byoy\b",
        r"\bebitda\b.*\brupees\b.*\byoy\b",
        r"\bsl net profit\b",
        r"\bcons net profit\b",
        r"\bsl net loss\b",
        r"\bcons net loss\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("results pattern"))
    .collect()
});

/// Earnings/results detection from the category tag or the headline text.
pub fn is_results_headline(text: &str, category: &str) -> bool {
    let cat = category.trim().to_lowercase();
    if matches!(cat.as_str(), "result" | "results" | "earning" | "earnings") {
        return true;
    }
    let lower = text.to_lowercase();
    if RE_QUARTER.is_match(&lower) && EARNINGS_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return true;
    }
    RESULTS_PATTERNS.iter().any(|re| re.is_match(&lower))
}

#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    suppressed: BTreeSet<String>,
}

impl CategoryFilter {
    pub fn new<I, S>(suppressed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            suppressed: suppressed
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn suppressed(&self) -> impl Iterator<Item = &str> {
        self.suppressed.iter().map(String::as_str)
    }

    /// Name of the suppressed category this record falls into, if any.
    pub fn suppressed_category(&self, text: &str, category: &str) -> Option<&str> {
        let tag = category.trim().to_lowercase();
        self.suppressed.iter().map(String::as_str).find(|s| {
            if *s == RESULTS {
                is_results_headline(text, category)
            } else {
                *s == tag
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_detected_by_tag_or_content() {
        assert!(is_results_headline("Anything", "Results"));
        assert!(is_results_headline("Tata Motors Q3 net profit rises 12% YoY", ""));
        assert!(is_results_headline("Infosys Cons Net Profit At Rs 6,500 Cr", ""));
        assert!(is_results_headline("ABC net profit at 120 rupees crore", ""));
        assert!(!is_results_headline("Q3 board meeting scheduled", ""));
        assert!(!is_results_headline("BEL wins defence order", "Orders"));
    }

    #[test]
    fn filter_only_matches_configured_categories() {
        let f = CategoryFilter::new(["Results", " ", "ipo"]);
        assert_eq!(f.suppressed().count(), 2);
        assert_eq!(
            f.suppressed_category("Tata Motors Q3 net profit rises 12% YoY", ""),
            Some(RESULTS)
        );
        assert_eq!(f.suppressed_category("XYZ files DRHP", "IPO"), Some("ipo"));
        assert_eq!(f.suppressed_category("BEL wins defence order", "Orders"), None);

        let open = CategoryFilter::default();
        assert_eq!(open.suppressed_category("Q3 net profit", "results"), None);
    }
}
