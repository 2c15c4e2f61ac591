//! Config file loading and saving, JSON and XML.

use portprobe::config::{IpVersion, ScanConfig};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("portprobe-test-{}-{}", std::process::id(), name));
    path
}

#[test]
fn json_file_round_trip() {
    let path = temp_path("round.json");

    let mut config = ScanConfig::new("192.0.2.9")
        .with_ports(vec![443, 22, 22, 80])
        .with_timeout(750)
        .with_concurrency(32)
        .with_ip_version(IpVersion::Ipv4);
    config.normalize_ports();
    config.save_to_file(&path).unwrap();

    let loaded = ScanConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.target, "192.0.2.9");
    assert_eq!(loaded.ports, vec![22, 80, 443]);
    assert_eq!(loaded.timeout, 750);
    assert_eq!(loaded.concurrency, 32);
    assert_eq!(loaded.ip_version, IpVersion::Ipv4);
}

#[test]
fn xml_file_round_trip() {
    let path = temp_path("round.xml");

    let mut config = ScanConfig::new("files.example.net").with_ports(vec![21, 990]);
    config.banner_grabbing = false;
    config.output_format = "json".to_string();
    config.save_to_file(&path).unwrap();

    let loaded = ScanConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.target, "files.example.net");
    assert_eq!(loaded.ports, vec![21, 990]);
    assert!(!loaded.banner_grabbing);
    assert!(loaded.service_detection);
    assert_eq!(loaded.output_format, "json");
}

#[test]
fn unsupported_extension_is_rejected() {
    let path = temp_path("config.yaml");
    std::fs::write(&path, "target: nope").unwrap();

    let result = ScanConfig::from_file(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(result.is_err());
}

#[test]
fn missing_file_is_an_error() {
    assert!(ScanConfig::from_file(temp_path("does-not-exist.json")).is_err());
}

#[test]
fn partial_json_keeps_defaults() {
    let path = temp_path("partial.json");
    std::fs::write(&path, r#"{ "target": "10.1.2.3", "timeout": 250 }"#).unwrap();

    let loaded = ScanConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.target, "10.1.2.3");
    assert_eq!(loaded.timeout, 250);
    // Untouched options come from the defaults.
    assert!(loaded.service_detection);
    assert_eq!(loaded.ip_version, IpVersion::Auto);
    assert!(!loaded.ports.is_empty());
}
