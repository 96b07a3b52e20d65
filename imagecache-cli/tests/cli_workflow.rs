//! Integration tests for the imagecache binary.
//!
//! Each test points the CLI at a temporary config file and cache directory,
//! and redirects the log directory into the same temp dir.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

/// Temp workspace with a config file pointing at its own cache directory.
struct Workspace {
    temp: TempDir,
    config: PathBuf,
    cache_dir: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache_dir = temp.path().join("cache");
        let config = temp.path().join("config.ini");
        std::fs::write(
            &config,
            format!("[cache]\ndirectory = {}\n", cache_dir.display()),
        )
        .expect("Failed to write config");

        Self {
            temp,
            config,
            cache_dir,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    /// Run the CLI with `--config` set, capturing output.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_imagecache"))
            .args(args)
            .arg("--config")
            .arg(&self.config)
            .env("XDG_CACHE_HOME", self.temp.path().join("xdg"))
            .output()
            .expect("Failed to execute CLI command")
    }
}

/// Assert a command succeeded, returning its stdout.
fn assert_success(output: &Output, context: &str) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "{} failed:\nstdout: {}\nstderr: {}",
            context, stdout, stderr
        );
    }
    stdout
}

fn write_png(path: &Path) {
    RgbaImage::from_fn(10, 5, |x, y| Rgba([x as u8 * 20, y as u8 * 40, 7, 255]))
        .save(path)
        .expect("Failed to write test image");
}

#[test]
fn test_put_get_round_trip() {
    let ws = Workspace::new();
    let input = ws.path("in.png");
    let output = ws.path("out.png");
    write_png(&input);

    let put = ws.run(&["put", input.to_str().unwrap(), "--key", "shield/us-101"]);
    let stdout = assert_success(&put, "put");
    assert!(stdout.contains("Stored 10x5"));

    let get = ws.run(&["get", "shield/us-101", "--output", output.to_str().unwrap()]);
    assert_success(&get, "get");

    let original = image::open(&input).unwrap().to_rgba8();
    let exported = image::open(&output).unwrap().to_rgba8();
    assert_eq!(original, exported);
}

#[test]
fn test_path_matches_stored_file() {
    let ws = Workspace::new();
    let input = ws.path("in.png");
    write_png(&input);

    assert_success(&ws.run(&["put", input.to_str().unwrap(), "--key", "k"]), "put");
    let stdout = assert_success(&ws.run(&["path", "k"]), "path");

    let path = PathBuf::from(stdout.trim());
    assert!(path.starts_with(&ws.cache_dir));
    assert!(path.exists());
}

#[test]
fn test_stats_and_clear() {
    let ws = Workspace::new();
    let input = ws.path("in.png");
    write_png(&input);

    for key in ["a", "b", "c"] {
        assert_success(&ws.run(&["put", input.to_str().unwrap(), "--key", key]), "put");
    }

    let stats = assert_success(&ws.run(&["stats"]), "stats");
    assert!(stats.contains("Files: 3"));

    let clear = assert_success(&ws.run(&["clear"]), "clear");
    assert!(clear.contains("Deleted 3 files"));

    let stats = assert_success(&ws.run(&["stats"]), "stats");
    assert!(stats.contains("Files: 0"));
}

#[test]
fn test_get_missing_key_fails() {
    let ws = Workspace::new();
    let output = ws.run(&["get", "absent", "--output", ws.path("o.png").to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No cached image for key 'absent'"));
}
