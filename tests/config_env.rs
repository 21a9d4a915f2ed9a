// tests/config_env.rs
use std::{env, fs};

use headline_sentinel::config::{
    SentinelConfig, SourceKind, ENV_CONFIG_PATH, ENV_EXCLUDE_RESULTS, ENV_SIMILARITY_THRESHOLD,
    ENV_STATE_DIR,
};

fn clear_env() {
    for k in [
        ENV_CONFIG_PATH,
        ENV_SIMILARITY_THRESHOLD,
        ENV_EXCLUDE_RESULTS,
        ENV_STATE_DIR,
        "SENTINEL_EMBEDDING",
        "SENTINEL_BIND",
    ] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn defaults_without_any_file() {
    // Isolate CWD so the repo's own config/ is not read
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    let cfg = SentinelConfig::load().unwrap();
    assert_eq!(cfg.monitor.interval_secs, 60);
    assert_eq!(cfg.monitor.utc_offset_minutes, 330);
    assert!((cfg.similarity.threshold - 0.68).abs() < 1e-6);
    assert_eq!(cfg.sources.len(), 1);
    assert_eq!(cfg.sources[0].kind, SourceKind::PageText);
    assert_eq!(cfg.api.bind, "0.0.0.0:5000");

    env::set_current_dir(old).unwrap();
}

#[serial_test::serial]
#[test]
fn file_from_env_then_env_overrides() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("sentinel.toml");
    fs::write(
        &p,
        r#"
[monitor]
interval_secs = 30
first_run_alerts = true

[similarity]
threshold = 0.75

[[sources]]
name = "wire"
kind = "rss"
url = "https://example.com/feed.xml"

[[sources]]
name = "replay"
kind = "fixture"
path = "fixtures/day.json"
enabled = false
"#,
    )
    .unwrap();

    clear_env();
    env::set_var(ENV_CONFIG_PATH, &p);
    env::set_var(ENV_SIMILARITY_THRESHOLD, "0.8");
    env::set_var(ENV_EXCLUDE_RESULTS, "true");
    env::set_var(ENV_STATE_DIR, "/tmp/sentinel-state");

    let cfg = SentinelConfig::load().unwrap();
    assert_eq!(cfg.monitor.interval_secs, 30);
    assert!(cfg.monitor.first_run_alerts);
    assert!((cfg.similarity.threshold - 0.8).abs() < 1e-6);
    assert_eq!(cfg.categories.suppress, vec!["results".to_string()]);
    assert_eq!(cfg.monitor.state_dir.to_str(), Some("/tmp/sentinel-state"));
    assert_eq!(cfg.sources.len(), 2);
    assert_eq!(cfg.enabled_sources().count(), 1);
    assert_eq!(cfg.sources[0].kind, SourceKind::Rss);

    clear_env();
}

#[serial_test::serial]
#[test]
fn broken_config_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("sentinel.toml");
    fs::write(&p, "[monitor\ninterval_secs = ").unwrap();

    clear_env();
    env::set_var(ENV_CONFIG_PATH, &p);
    assert!(SentinelConfig::load().is_err());
    clear_env();
}
