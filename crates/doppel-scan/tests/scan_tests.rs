use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use doppel_scan::{
    DuplicatePair, DuplicateScanner, FileHasher, FilterConfig, FingerprintKind, MatchPolicy,
    ScanConfig, ScanError, WarningKind,
};

fn scan(root: &Path) -> doppel_scan::ScanReport {
    DuplicateScanner::new().scan(&ScanConfig::new(root)).unwrap()
}

fn canonical(temp: &TempDir) -> PathBuf {
    temp.path().canonicalize().unwrap()
}

/// Left half dark, right half bright, optionally with one pixel nudged.
fn split_image(nudge: bool) -> RgbImage {
    let mut img = RgbImage::from_fn(64, 64, |x, _| {
        if x < 32 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
    });
    if nudge {
        img.put_pixel(48, 32, Rgb([250, 250, 250]));
    }
    img
}

#[test]
fn test_identical_bytes_identical_fingerprint() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("one.bin"), b"\x00\x01\x02same").unwrap();
    fs::write(temp.path().join("two.dat"), b"\x00\x01\x02same").unwrap();
    fs::write(temp.path().join("three.bin"), b"\x00\x01\x02diff").unwrap();

    let hasher = FileHasher::default();
    let one = hasher.fingerprint(&temp.path().join("one.bin")).unwrap();
    let two = hasher.fingerprint(&temp.path().join("two.dat")).unwrap();
    let three = hasher.fingerprint(&temp.path().join("three.bin")).unwrap();

    assert_eq!(one.fingerprint, two.fingerprint);
    assert_ne!(one.fingerprint, three.fingerprint);
}

#[test]
fn test_abc_scenario() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "X").unwrap();
    fs::write(temp.path().join("b.txt"), "X").unwrap();
    fs::write(temp.path().join("c.txt"), "Y").unwrap();

    let report = scan(temp.path());
    let root = canonical(&temp);

    assert_eq!(
        report.pairs,
        vec![DuplicatePair::new(root.join("b.txt"), root.join("a.txt"))]
    );
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.extension_stats().get("txt"), Some(&1));
    assert!(report.original_of(&root.join("c.txt")).is_none());
}

#[test]
fn test_rescan_is_idempotent() {
    let temp = TempDir::new().unwrap();
    for dir in ["x", "y", "z"] {
        fs::create_dir(temp.path().join(dir)).unwrap();
        for (name, content) in [("1.txt", "one"), ("2.txt", "two"), ("3.txt", "one")] {
            fs::write(temp.path().join(dir).join(name), content).unwrap();
        }
    }

    let first = scan(temp.path());
    let second = scan(temp.path());

    assert_eq!(first.pairs, second.pairs);
    assert_eq!(first.duplicate_count(), 7);
}

#[test]
fn test_original_is_first_in_sorted_walk() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("b/deep")).unwrap();
    fs::write(temp.path().join("b/deep/copy.txt"), "content").unwrap();
    fs::write(temp.path().join("a.txt"), "content").unwrap();
    fs::write(temp.path().join("c.txt"), "content").unwrap();

    let report = scan(temp.path());
    let root = canonical(&temp);

    assert_eq!(report.duplicate_count(), 2);
    assert!(report.pairs.iter().all(|p| p.original == root.join("a.txt")));
    assert_eq!(report.pairs[0].duplicate, root.join("b/deep/copy.txt"));
    assert_eq!(report.pairs[1].duplicate, root.join("c.txt"));
}

#[test]
fn test_zero_byte_files_collide() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("empty1"), "").unwrap();
    fs::write(temp.path().join("empty2"), "").unwrap();
    fs::write(temp.path().join("empty3.log"), "").unwrap();

    let report = scan(temp.path());

    assert_eq!(report.duplicate_count(), 2);
    assert_eq!(report.extension_stats().get(""), Some(&1));
    assert_eq!(report.extension_stats().get("log"), Some(&1));
    assert_eq!(report.stats.reclaimable_bytes, 0);
}

#[test]
fn test_filter_extensions_and_sizes() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.jpg"), "1234567890").unwrap();
    fs::write(temp.path().join("b.JPG"), "1234567890").unwrap();
    fs::write(temp.path().join("c.txt"), "1234567890").unwrap();
    fs::write(temp.path().join("tiny.jpg"), "1").unwrap();
    fs::write(temp.path().join("tiny2.jpg"), "1").unwrap();

    let filter = FilterConfig::builder()
        .extensions(FilterConfig::parse_extensions("*.jpg"))
        .min_size(10u64)
        .max_size(10u64)
        .build()
        .unwrap();
    let config = ScanConfig::new(temp.path())
        .with_filter(filter)
        .with_match_policy(MatchPolicy::exact_only());

    let report = DuplicateScanner::new().scan(&config).unwrap();

    assert_eq!(report.stats.files_seen, 5);
    assert_eq!(report.stats.files_filtered, 3);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.duplicate_count(), 1);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_skipped() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("real.txt"), "data").unwrap();
    std::os::unix::fs::symlink(temp.path().join("real.txt"), temp.path().join("link.txt"))
        .unwrap();
    std::os::unix::fs::symlink(temp.path(), temp.path().join("loop")).unwrap();

    let report = scan(temp.path());

    assert_eq!(report.stats.files_seen, 1);
    assert!(!report.has_duplicates());
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_warned_and_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "X").unwrap();
    fs::write(temp.path().join("b.txt"), "X").unwrap();
    let locked = temp.path().join("locked.txt");
    fs::write(&locked, "X").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not stop root.
    if fs::File::open(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let report = scan(temp.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    let root = canonical(&temp);
    let locked = root.join("locked.txt");
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].path, locked);
    assert_eq!(report.warnings[0].kind, WarningKind::PermissionDenied);
    assert!(report.records.iter().all(|r| r.path != locked));
    assert_eq!(
        report.pairs,
        vec![DuplicatePair::new(root.join("b.txt"), root.join("a.txt"))]
    );
    assert_eq!(report.stats.files_seen, 3);
}

#[test]
fn test_missing_root_is_invalid() {
    let temp = TempDir::new().unwrap();
    let err = DuplicateScanner::new()
        .scan(&ScanConfig::new(temp.path().join("missing")))
        .unwrap_err();
    assert!(matches!(err, ScanError::NotFound { .. }));
    assert!(err.is_invalid_root());
}

#[test]
fn test_file_root_is_invalid() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("file.txt");
    fs::write(&file, "x").unwrap();

    let err = DuplicateScanner::new()
        .scan(&ScanConfig::new(&file))
        .unwrap_err();
    assert!(matches!(err, ScanError::NotADirectory { .. }));
}

#[test]
fn test_cancelled_scan_produces_nothing() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.txt"), "X").unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let result =
        DuplicateScanner::new().scan_with_cancel(&ScanConfig::new(temp.path()), &token);
    assert!(matches!(result, Err(ScanError::Interrupted)));
}

#[test]
fn test_same_size_images_match_perceptually() {
    let temp = TempDir::new().unwrap();
    split_image(false).save(temp.path().join("a.bmp")).unwrap();
    split_image(true).save(temp.path().join("b.bmp")).unwrap();

    let a = fs::read(temp.path().join("a.bmp")).unwrap();
    let b = fs::read(temp.path().join("b.bmp")).unwrap();
    assert_eq!(a.len(), b.len());
    assert_ne!(a, b);

    let report = scan(temp.path());
    let root = canonical(&temp);

    assert_eq!(
        report.pairs,
        vec![DuplicatePair::new(root.join("b.bmp"), root.join("a.bmp"))]
    );
    assert!(report
        .records
        .iter()
        .all(|r| r.fingerprint.kind() == FingerprintKind::Perceptual));
}

#[test]
fn test_different_size_images_need_policy_switch() {
    let temp = TempDir::new().unwrap();
    split_image(false).save(temp.path().join("a.bmp")).unwrap();
    split_image(false).save(temp.path().join("b.png")).unwrap();

    assert!(!scan(temp.path()).has_duplicates());

    let policy = MatchPolicy {
        perceptual_ignores_size: true,
        ..MatchPolicy::default()
    };
    let config = ScanConfig::new(temp.path()).with_match_policy(policy);
    let report = DuplicateScanner::new().scan(&config).unwrap();

    assert_eq!(report.duplicate_count(), 1);
    assert_eq!(report.extension_stats().get("png"), Some(&1));
}

#[test]
fn test_exact_only_policy_ignores_visual_similarity() {
    let temp = TempDir::new().unwrap();
    split_image(false).save(temp.path().join("a.bmp")).unwrap();
    split_image(true).save(temp.path().join("b.bmp")).unwrap();

    let config = ScanConfig::new(temp.path()).with_match_policy(MatchPolicy::exact_only());
    let report = DuplicateScanner::new().scan(&config).unwrap();

    assert!(!report.has_duplicates());
}

#[test]
fn test_corrupt_image_falls_back_and_still_matches() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.png"), "not an image").unwrap();
    fs::write(temp.path().join("b.png"), "not an image").unwrap();

    let report = scan(temp.path());

    assert_eq!(report.duplicate_count(), 1);
    assert_eq!(report.stats.perceptual_fallbacks, 2);
    assert!(!report.has_warnings());
}
