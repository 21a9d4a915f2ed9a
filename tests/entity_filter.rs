// tests/entity_filter.rs
use std::fs;

use headline_sentinel::entity::EntityFilter;

#[test]
fn lists_merge_from_json_and_toml() {
    let dir = tempfile::tempdir().unwrap();

    let p_json = dir.path().join("nifty.json");
    fs::write(
        &p_json,
        r#"[
  {"symbol": "NATCOPHARM", "name": "Natco Pharma Ltd"},
  {"symbol": "M&M", "name": "Mahindra & Mahindra Ltd", "aliases": ["Mahindra"]}
]"#,
    )
    .unwrap();

    let p_toml = dir.path().join("extra.toml");
    fs::write(
        &p_toml,
        r#"
[[entities]]
symbol = "HAL"
name = "Hindustan Aeronautics Limited"
"#,
    )
    .unwrap();

    let f = EntityFilter::load(&[p_json, p_toml]);
    assert!(f.is_active());
    assert!(f.load_errors().is_empty());

    for id in ["NATCOPHARM", "Natco Pharma", "natco pharma ltd.", "M&M", "Mahindra", "HAL"] {
        assert!(f.matches(id), "{id} should match");
    }
    // exact alias lookup, never a substring hit
    assert!(!f.matches("Natco"));
    assert!(!f.matches("Infosys"));
}

#[test]
fn unreadable_lists_fail_open_and_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("broken.json");
    fs::write(&bad, "{{{").unwrap();
    let missing = dir.path().join("missing.json");

    let f = EntityFilter::load(&[bad, missing]);
    assert!(!f.is_active());
    assert_eq!(f.load_errors().len(), 2);
    assert!(f.matches("Anything Ltd"));
}

#[test]
fn one_good_list_is_enough() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("wl.json");
    fs::write(&good, r#"{"entities": [{"name": "Infosys Ltd"}]}"#).unwrap();

    let f = EntityFilter::load(&[dir.path().join("missing.json"), good]);
    assert!(f.is_active());
    assert_eq!(f.load_errors().len(), 1);
    assert!(f.matches("Infosys"));
    assert!(!f.matches("Wipro"));
}
