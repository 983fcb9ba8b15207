//! Drives the compiled `psarc` binary end to end: create, list, and extract.

use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn psarc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_psarc"))
}

#[test]
fn create_list_extract_round_trip() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("a.txt"), b"alpha\n").unwrap();
    fs::write(dir.path().join("sub/b.txt"), b"beta\n").unwrap();

    let archive = dir.path().join("out.psarc");

    let create = psarc()
        .current_dir(dir.path())
        .args([
            "create",
            archive.to_str().unwrap(),
            "a.txt",
            "sub/b.txt",
            "--compression",
            "store",
            "--num-threads",
            "1",
        ])
        .output()
        .unwrap();
    assert!(create.status.success(), "create failed: {}", String::from_utf8_lossy(&create.stderr));

    let list = psarc().arg("list").arg(&archive).output().unwrap();
    assert!(list.status.success());
    let stdout = String::from_utf8_lossy(&list.stdout);
    assert!(stdout.contains("a.txt"));
    assert!(stdout.contains("sub/b.txt"));

    let info = psarc().arg("info").arg(&archive).output().unwrap();
    assert!(info.status.success());

    let extract_dir = TempDir::new().unwrap();
    let extract = psarc()
        .args([
            "extract",
            archive.to_str().unwrap(),
            "--target-dir",
            extract_dir.path().to_str().unwrap(),
            "--overwrite",
        ])
        .output()
        .unwrap();
    assert!(extract.status.success(), "extract failed: {}", String::from_utf8_lossy(&extract.stderr));

    assert_eq!(fs::read(extract_dir.path().join("a.txt")).unwrap(), b"alpha\n");
    assert_eq!(fs::read(extract_dir.path().join("sub/b.txt")).unwrap(), b"beta\n");
}

#[test]
fn create_without_overwrite_fails_on_existing_archive() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), b"x").unwrap();
    let archive = dir.path().join("out.psarc");
    fs::write(&archive, b"already here").unwrap();

    let create = psarc()
        .current_dir(dir.path())
        .args(["create", archive.to_str().unwrap(), "a.txt"])
        .output()
        .unwrap();

    assert_eq!(create.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&create.stderr).is_empty());
}

#[test]
fn list_on_missing_archive_reports_usage_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.psarc");

    let list = psarc().arg("list").arg(&missing).output().unwrap();
    assert_eq!(list.status.code(), Some(1));
}
