use doppel_core::{
    DuplicatePair, FileRecord, FilterConfig, Fingerprint, FingerprintKind, MatchPolicy,
    ScanConfig, ScanReport, ScanStats,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[test]
fn test_fingerprint_equality() {
    let a = Fingerprint::content([0x11; 32]);
    let b = Fingerprint::content([0x11; 32]);
    let c = Fingerprint::content([0x22; 32]);

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.to_string(), a.as_str());
}

#[test]
fn test_fingerprint_kinds_do_not_collide() {
    let content = Fingerprint::content([0; 32]);
    let perceptual = Fingerprint::perceptual(0);

    assert_ne!(content, perceptual);
    assert_ne!(content.composite_key(0), perceptual.composite_key(0));
}

#[test]
fn test_fingerprint_from_parts() {
    let fp = Fingerprint::from_parts(FingerprintKind::Perceptual, "00000000000000ff");
    assert_eq!(fp, Fingerprint::perceptual(0xff));
}

#[test]
fn test_file_record_key_and_extension() {
    let record = FileRecord::new(
        "/photos/IMG_0001.JPEG",
        2048,
        SystemTime::UNIX_EPOCH,
        Fingerprint::perceptual(7),
        true,
    );

    assert_eq!(record.extension(), "jpeg");
    assert_eq!(record.composite_key(), "0000000000000007_2048");
}

#[test]
fn test_scan_report_accessors() {
    let mut stats = ScanStats::new();
    stats.record_duplicate(Path::new("/root/b.txt"), 1);

    let report = ScanReport::new(
        PathBuf::from("/root"),
        ScanConfig::new("/root"),
        Vec::new(),
        vec![DuplicatePair::new("/root/b.txt", "/root/a.txt")],
        stats,
        Duration::from_millis(5),
        Vec::new(),
    );

    assert!(report.has_duplicates());
    assert_eq!(report.duplicate_count(), 1);
    assert!(!report.has_warnings());
    assert_eq!(report.extension_stats().get("txt"), Some(&1));
    assert_eq!(
        report.original_of(Path::new("/root/b.txt")),
        Some(Path::new("/root/a.txt"))
    );
    assert_eq!(report.original_of(Path::new("/root/a.txt")), None);
}

#[test]
fn test_scan_config_deserialize_defaults() {
    let json = r#"{ "root": "/data", "filter": { "extensions": ["*.jpg"] } }"#;
    let config: ScanConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.root, PathBuf::from("/data"));
    assert_eq!(config.filter.min_size, 0);
    assert_eq!(config.filter.max_size, u64::MAX);
    assert!(!config.filter.accepts_all_extensions());
    assert!(config.include_hidden);
    assert_eq!(config.match_policy, MatchPolicy::default());
}

#[test]
fn test_scan_config_with_filter() {
    let filter = FilterConfig::builder()
        .min_size(1u64)
        .max_size(1024u64)
        .extensions(vec!["txt".to_string()])
        .build()
        .unwrap();
    let config = ScanConfig::new("/data")
        .with_filter(filter.clone())
        .with_match_policy(MatchPolicy::exact_only());

    assert_eq!(config.filter, filter);
    assert!(!config.match_policy.perceptual);
}
