// tests/integration/config_test.rs

//! Tests for configuration loading and validation.

use std::io::Write;
use subdocd::config::Config;
use subdocd::core::storage::vbucket::DEFAULT_NUM_VBUCKETS;
use tempfile::NamedTempFile;

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 11210);
    assert_eq!(config.storage.num_vbuckets, DEFAULT_NUM_VBUCKETS);
    assert!(config.storage.owned_vbuckets.is_none());
    config.validate().unwrap();

    assert_eq!(Config::from_toml("").unwrap(), config);
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
host = "0.0.0.0"
port = 12000
log_level = "debug"
max_clients = 4

[storage]
num_vbuckets = 8
owned_vbuckets = [0, 3]
"#
    )
    .unwrap();

    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 12000);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.max_clients, 4);

    let map = config.storage.vbucket_map();
    assert_eq!(map.num_vbuckets(), 8);
    assert!(map.is_owned(0) && map.is_owned(3));
    assert!(!map.is_owned(1) && !map.is_owned(8));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let error = Config::from_file(path.to_str().unwrap()).unwrap_err();
    assert!(format!("{error:#}").contains("Failed to read config file"));
}

#[test]
fn test_invalid_configs_are_rejected() {
    let cases = [
        (r#"host = " ""#, "host cannot be empty"),
        ("max_clients = 0", "max_clients cannot be 0"),
        ("max_packet_size = 0", "max_packet_size cannot be 0"),
        ("[storage]\nnum_vbuckets = 0", "num_vbuckets cannot be 0"),
        ("[storage]\nowned_vbuckets = []", "owned_vbuckets cannot be empty"),
        (
            "[storage]\nnum_vbuckets = 4\nowned_vbuckets = [4]",
            "contains 4 but only 4 vbuckets exist",
        ),
    ];
    for (toml, expected) in cases {
        let error = Config::from_toml(toml).unwrap_err();
        assert!(
            format!("{error:#}").contains(expected),
            "{toml:?} gave {error:#}"
        );
    }
}

#[test]
fn test_unknown_fields_are_rejected() {
    assert!(Config::from_toml("prot = 1").is_err());
    assert!(Config::from_toml("[storage]\nvbuckets = 1").is_err());
}
