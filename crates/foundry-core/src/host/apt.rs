//! apt-based package management.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use tracing::info;

use super::PackageManager;
use super::command::run;

const ARMORED_KEY_HEADER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
const KEYSERVER: &str = "hkp://keyserver.ubuntu.com:80";

/// Drives `apt-get` and manages one named source list.
#[derive(Debug, Clone)]
pub struct Apt {
    source_name: String,
    sources_dir: PathBuf,
    keyring_dir: PathBuf,
}

impl Default for Apt {
    fn default() -> Self {
        Self {
            source_name: "nodesource".to_string(),
            sources_dir: PathBuf::from("/etc/apt/sources.list.d"),
            keyring_dir: PathBuf::from("/etc/apt/trusted.gpg.d"),
        }
    }
}

impl Apt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirs(source_name: &str, sources_dir: PathBuf, keyring_dir: PathBuf) -> Self {
        Self {
            source_name: source_name.to_string(),
            sources_dir,
            keyring_dir,
        }
    }

    pub fn source_file(&self) -> PathBuf {
        self.sources_dir.join(format!("{}.list", self.source_name))
    }

    pub fn keyring_file(&self) -> PathBuf {
        self.keyring_dir.join(format!("{}.asc", self.source_name))
    }

    fn import_key(&self, key: &str) -> anyhow::Result<()> {
        if is_armored(key) {
            write_file(&self.keyring_file(), key)?;
            return Ok(());
        }
        run(Command::new("apt-key").args([
            "adv",
            "--keyserver",
            KEYSERVER,
            "--recv-keys",
            key.trim(),
        ]))
        .with_context(|| format!("Failed to import apt key {}", key.trim()))?;
        Ok(())
    }
}

impl PackageManager for Apt {
    fn add_repository(&self, line: &str, key: Option<&str>) -> anyhow::Result<()> {
        info!(line = %line, source = %self.source_file().display(), "adding apt source");
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.import_key(key)?;
        }
        write_file(&self.source_file(), &format!("{}\n", line.trim()))
    }

    fn update(&self) -> anyhow::Result<()> {
        run(apt_get().arg("update")).context("apt-get update failed")?;
        Ok(())
    }

    fn install_packages(&self, packages: &[&str]) -> anyhow::Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        info!(?packages, "installing packages");
        run(apt_get()
            .args(["install", "--yes", "--option=Dpkg::Options::=--force-confold"])
            .args(packages))
        .with_context(|| format!("Failed to install packages: {}", packages.join(" ")))?;
        Ok(())
    }
}

fn apt_get() -> Command {
    let mut cmd = Command::new("apt-get");
    cmd.env("DEBIAN_FRONTEND", "noninteractive");
    cmd
}

fn is_armored(key: &str) -> bool {
    key.trim_start().starts_with(ARMORED_KEY_HEADER)
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))
}
