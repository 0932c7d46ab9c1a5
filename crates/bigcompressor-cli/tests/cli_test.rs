//! Integration tests for the bigcompressor CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn bigcompressor() -> Command {
    let mut cmd = Command::cargo_bin("bigcompressor").unwrap();
    for var in [
        "BIGCOMPRESSOR_CONFIG",
        "BIGCOMPRESSOR_MAX_CHUNK_SIZE",
        "BIGCOMPRESSOR_COMBINE_CHUNKS",
        "BIGCOMPRESSOR_MAX_SCAN_BUFFER",
        "BIGCOMPRESSOR_FRAMING",
        "BIGCOMPRESSOR_CODEC",
        "BIGCOMPRESSOR_COPY_BUFFER_SIZE",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn source_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("b")).unwrap();
    fs::write(dir.path().join("a.txt"), vec![b'a'; 5000]).unwrap();
    fs::write(dir.path().join("b/b1.txt"), vec![b'1'; 5000]).unwrap();
    fs::write(dir.path().join("b/b2.txt"), vec![b'2'; 5000]).unwrap();
    dir
}

fn assert_same_file(a: &Path, b: &Path) {
    assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap(), "{}", a.display());
}

#[test]
fn test_help_command() {
    bigcompressor()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("compress"))
        .stdout(predicate::str::contains("decompress"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("plan"));
}

#[test]
fn test_version_command() {
    bigcompressor()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bigcompressor"));
}

#[test]
fn test_invalid_command() {
    bigcompressor()
        .arg("explode")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_compress_and_decompress_round_trip() {
    let src = source_tree();
    let work = TempDir::new().unwrap();
    let archive = work.path().join("out/tree.bc");
    let restore = work.path().join("restore");

    bigcompressor()
        .args(["--max-chunk-size", "8000", "compress"])
        .arg(src.path())
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("into 3 chunks"));

    bigcompressor()
        .arg("decompress")
        .arg(&archive)
        .arg(&restore)
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 3 files"));

    for name in ["a.txt", "b/b1.txt", "b/b2.txt"] {
        assert_same_file(&src.path().join(name), &restore.join(name));
    }
}

#[test]
fn test_split_output_through_environment() {
    let src = source_tree();
    let work = TempDir::new().unwrap();
    let prefix = work.path().join("part");
    let restore = work.path().join("restore");

    bigcompressor()
        .env("BIGCOMPRESSOR_COMBINE_CHUNKS", "false")
        .env("BIGCOMPRESSOR_MAX_CHUNK_SIZE", "8000")
        .arg("compress")
        .arg(src.path())
        .arg(&prefix)
        .assert()
        .success();

    assert!(work.path().join("part_0").is_file());
    assert!(work.path().join("part_2").is_file());
    assert!(!work.path().join("part_3").exists());

    bigcompressor()
        .args(["decompress", "--split"])
        .arg(&prefix)
        .arg(&restore)
        .assert()
        .success();

    assert_same_file(&src.path().join("b/b2.txt"), &restore.join("b/b2.txt"));
}

#[test]
fn test_config_file_is_applied() {
    let src = source_tree();
    let work = TempDir::new().unwrap();
    let config = work.path().join("bigcompressor.toml");
    fs::write(
        &config,
        "max_chunk_size = 100000\nframing = \"length-prefixed\"\ncodec = \"zlib\"\n",
    )
    .unwrap();
    let archive = work.path().join("tree.bc");

    bigcompressor()
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "compress"])
        .arg(src.path())
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"chunks\": 1"));

    // The length prefix of the only chunk is followed by a zlib header.
    let bytes = fs::read(&archive).unwrap();
    assert_eq!(bytes[8], 0x78);

    // Marker framing cannot read the length-prefixed file.
    bigcompressor()
        .arg("decompress")
        .arg(&archive)
        .arg(work.path().join("wrong"))
        .assert()
        .failure();

    bigcompressor()
        .arg("--config")
        .arg(&config)
        .arg("decompress")
        .arg(&archive)
        .arg(work.path().join("restore"))
        .assert()
        .success();
}

#[test]
fn test_list_json() {
    let src = source_tree();
    let work = TempDir::new().unwrap();
    let archive = work.path().join("tree.bc");

    bigcompressor()
        .args(["--max-chunk-size", "8K", "compress"])
        .arg(src.path())
        .arg(&archive)
        .assert()
        .success();

    let output = bigcompressor()
        .args(["--format", "json", "list"])
        .arg(&archive)
        .output()
        .unwrap();
    assert!(output.status.success());

    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let chunks = listing.as_array().unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2]["entries"][0]["path"], "b/b2.txt");
}

#[test]
fn test_plan_text() {
    let src = source_tree();
    bigcompressor()
        .args(["--max-chunk-size", "8000", "plan"])
        .arg(src.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("chunk 0: 1 entries, 5000 bytes"))
        .stdout(predicate::str::contains("chunk 1: 2 entries, 5000 bytes"))
        .stdout(predicate::str::contains("chunk 2: 1 entries, 5000 bytes"));
}

#[test]
fn test_invalid_size_rejected() {
    bigcompressor()
        .args(["--max-chunk-size", "lots", "plan", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid size"));
}

#[test]
fn test_missing_source_reports_error() {
    let work = TempDir::new().unwrap();
    bigcompressor()
        .arg("compress")
        .arg(work.path().join("absent"))
        .arg(work.path().join("out.bc"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to compress"));
}
