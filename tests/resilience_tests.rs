//! Behaviour with damaged archives and backups.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use vfs_patcher::codec::{write_filetime, write_i32, write_string, write_u32, FileTime};
use vfs_patcher::config::{GapPolicy, PatchConfig, VFS_MAGIC};
use vfs_patcher::{Error, VfsArchive};

/// Header of `Textures.vfs`: readme.txt (12 bytes at 78), textures/a.png
/// (100 bytes at `png_offset`).
fn header(png_offset: i32) -> Vec<u8> {
    let mut buf = Vec::new();
    write_u32(&mut buf, VFS_MAGIC).unwrap();
    write_i32(&mut buf, 1).unwrap();
    write_i32(&mut buf, 1).unwrap();
    write_string(&mut buf, "readme.txt", true).unwrap();
    write_i32(&mut buf, 12).unwrap();
    write_i32(&mut buf, 78).unwrap();
    write_filetime(&mut buf, FileTime::from_unix_secs(1_000)).unwrap();
    write_string(&mut buf, "textures", true).unwrap();
    write_i32(&mut buf, 0).unwrap();
    write_i32(&mut buf, 1).unwrap();
    write_string(&mut buf, "a.png", true).unwrap();
    write_i32(&mut buf, 100).unwrap();
    write_i32(&mut buf, png_offset).unwrap();
    write_filetime(&mut buf, FileTime::from_unix_secs(2_000)).unwrap();
    assert_eq!(buf.len(), 78);
    buf
}

fn setup(bytes: &[u8]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("Textures.vfs");
    fs::write(&path, bytes).expect("Failed to write archive");
    (temp_dir, path)
}

fn intact() -> Vec<u8> {
    let mut bytes = header(90);
    bytes.extend_from_slice(b"hello world!");
    bytes.extend(std::iter::repeat(0x11).take(100));
    bytes
}

#[test]
fn test_shortened_backup_is_padded() {
    let (_dir, path) = setup(&intact());

    let mut archive = VfsArchive::open(&path, PatchConfig::default()).unwrap();
    archive.save().expect("First save failed");
    drop(archive);

    // Lose the last 40 bytes of a.png in the backup.
    let backup = PathBuf::from(format!("{}.bak", path.display()));
    let bytes = fs::read(&backup).unwrap();
    fs::write(&backup, &bytes[..150]).unwrap();

    let mut archive = VfsArchive::open_pristine(&path, PatchConfig::default()).unwrap();
    let report = archive.save().expect("Save with short payload should not abort");
    assert_eq!(report.size_mismatches, 1);
    assert_eq!(report.files_written, 2);
    assert_eq!(report.total_bytes, 190);

    let written = fs::read(&path).unwrap();
    assert_eq!(written.len(), 190);
    assert_eq!(&written[78..90], b"hello world!");
    assert!(written[90..150].iter().all(|&b| b == 0x11));
    assert!(written[150..].iter().all(|&b| b == 0));
}

#[test]
fn test_short_read_is_reported_not_fatal() {
    let mut bytes = intact();
    bytes.truncate(120);
    let (_dir, path) = setup(&bytes);

    let archive = VfsArchive::open(&path, PatchConfig::default()).unwrap();
    let data = archive.read_file("textures/a.png").unwrap();
    assert_eq!(data.len(), 30);
}

#[test]
fn test_gap_in_source_layout_is_closed_on_save() {
    // a.png sits 8 bytes after readme.txt instead of directly behind it.
    let mut bytes = header(98);
    bytes.extend_from_slice(b"hello world!");
    bytes.extend_from_slice(&[0xEE; 8]);
    bytes.extend(std::iter::repeat(0x22).take(100));
    let (_dir, path) = setup(&bytes);

    let mut archive = VfsArchive::open(&path, PatchConfig::default()).unwrap();
    let report = archive.save().unwrap();
    assert_eq!(report.gap_bytes, 0);
    assert_eq!(report.total_bytes, 190);

    let written = fs::read(&path).unwrap();
    assert!(written[90..].iter().all(|&b| b == 0x22));
}

#[test]
fn test_bad_config_rejected_before_open() {
    let (_dir, path) = setup(&intact());
    let config = PatchConfig {
        backup_suffix: String::new(),
        gap_policy: GapPolicy::ZeroFill,
        ..Default::default()
    };

    let result = VfsArchive::open(&path, config);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_config_from_file() {
    let (dir, path) = setup(&intact());
    let config_path = dir.path().join("patcher.json");
    fs::write(
        &config_path,
        r#"{ "backup_suffix": ".orig", "overwrite": false }"#,
    )
    .unwrap();

    let config = PatchConfig::load(&config_path).unwrap();
    assert!(!config.overwrite);
    assert_eq!(config.gap_policy, GapPolicy::Error);

    let mut archive = VfsArchive::open(&path, config).unwrap();
    archive.save().unwrap();
    assert!(dir.path().join("Textures.vfs.orig").exists());
    assert!(!dir.path().join("Textures.vfs.bak").exists());
}

#[test]
fn test_header_counts_beyond_data() {
    // Root claims three files but only the magic and counts are present.
    let mut bytes = Vec::new();
    write_u32(&mut bytes, VFS_MAGIC).unwrap();
    write_i32(&mut bytes, 0).unwrap();
    write_i32(&mut bytes, 3).unwrap();
    let (_dir, path) = setup(&bytes);

    let result = VfsArchive::open(&path, PatchConfig::default());
    assert!(matches!(result, Err(Error::TruncatedInput)));
}

#[test]
fn test_empty_file() {
    let (_dir, path) = setup(&[]);
    let result = VfsArchive::open(&path, PatchConfig::default());
    assert!(matches!(result, Err(Error::TruncatedInput)));
}
