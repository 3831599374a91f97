//! Shared helpers for black-box CLI specs.
//!
//! Every spec gets its own base directory and drives the real `fscoord`
//! binary against it.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

/// A throwaway base directory
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Base directory with `fscoord.toml` set to `config`
    pub fn with_config(config: &str) -> Self {
        let project = Self::empty();
        std::fs::write(project.path().join("fscoord.toml"), config).unwrap();
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `fscoord` pointed at this base directory
    pub fn fscoord(&self) -> Cli {
        let mut cmd = Command::cargo_bin("fscoord").unwrap();
        cmd.env("FSCOORD_BASE", self.path())
            .env_remove("FSCOORD_ID")
            .env_remove("RUST_LOG");
        Cli { cmd }
    }

    /// `fscoord` acting under a fixed holder id
    pub fn fscoord_as(&self, id: &str) -> Cli {
        let mut cli = self.fscoord();
        cli.cmd.env("FSCOORD_ID", id);
        cli
    }

    /// Entry names in one of the base directory's subdirectories
    pub fn entries(&self, dir: &str) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(self.path().join(dir))
            .map(|read| {
                read.filter_map(|e| e.ok()?.file_name().into_string().ok())
                    .filter(|n| !n.starts_with(".tmp-"))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

pub struct Cli {
    cmd: Command,
}

impl Cli {
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.cmd.args(args);
        self
    }

    pub fn passes(mut self) -> Output {
        let output = self.cmd.output().unwrap();
        assert!(
            output.status.success(),
            "expected success, got {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        Output::from(output)
    }

    pub fn fails(mut self) -> Output {
        let output = self.cmd.output().unwrap();
        assert!(
            !output.status.success(),
            "expected failure\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        );
        Output::from(output)
    }
}

pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for Output {
    fn from(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl Output {
    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(
            self.stdout.contains(needle),
            "stdout does not contain {:?}:\n{}",
            needle,
            self.stdout
        );
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(
            self.stderr.contains(needle),
            "stderr does not contain {:?}:\n{}",
            needle,
            self.stderr
        );
        self
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        assert!(
            !self.stdout.contains(needle),
            "stdout unexpectedly contains {:?}:\n{}",
            needle,
            self.stdout
        );
        self
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}):\n{}", self.stdout))
    }
}

/// Wait long enough for just-enqueued entries to become claimable
pub fn settle() {
    std::thread::sleep(std::time::Duration::from_millis(5));
}
