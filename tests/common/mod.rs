#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

pub fn tabpipe() -> Command {
    let mut command = Command::cargo_bin("tabpipe").expect("binary exists");
    command.env_remove("RUST_LOG");
    command
}

/// The `[k, v]` table used throughout: `a 1`, `b 2`, `a 3`.
pub const KV_TSV: &str = "k\tv\na\t1\nb\t2\na\t3\n";

pub fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}
