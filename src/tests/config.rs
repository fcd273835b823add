use super::helpers::test_config;
use crate::config::WaypathConfig;

#[test_log::test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = WaypathConfig::load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(loaded, WaypathConfig::default());
    assert_eq!(loaded.preferred_layout.as_deref(), Some("static"));
    assert_eq!(loaded.max_ancestor_depth, 10);
    assert!(loaded.fallback_collections.is_empty());
}

#[test_log::test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("waypath.toml");
    let config = test_config();
    config.save(&path).unwrap();
    let loaded = WaypathConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test_log::test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("waypath.toml");
    std::fs::write(&path, "max_ancestor_depth = 4\n").unwrap();
    let loaded = WaypathConfig::load(&path).unwrap();
    assert_eq!(loaded.max_ancestor_depth, 4);
    assert_eq!(loaded.build_wait_ms, WaypathConfig::default().build_wait_ms);
}

#[test_log::test]
fn test_unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("waypath.toml");
    std::fs::write(&path, "max_ancester_depth = 4\n").unwrap();
    assert!(WaypathConfig::load(&path).is_err());
}
