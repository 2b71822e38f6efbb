//! Host name, address and distribution lookup.

use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;

use super::HostIdentity;
use super::command::run;

#[derive(Debug, Clone)]
pub struct SystemHost {
    os_release: PathBuf,
    hostname_file: PathBuf,
}

impl Default for SystemHost {
    fn default() -> Self {
        Self {
            os_release: PathBuf::from("/etc/os-release"),
            hostname_file: PathBuf::from("/etc/hostname"),
        }
    }
}

impl SystemHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostIdentity for SystemHost {
    fn fqdn(&self) -> anyhow::Result<String> {
        if let Ok(out) = run(Command::new("hostname").arg("--fqdn"))
            && let Some(name) = first_token(&out)
        {
            return Ok(name);
        }
        let content = std::fs::read_to_string(&self.hostname_file)
            .with_context(|| format!("Failed to read {}", self.hostname_file.display()))?;
        first_token(&content).ok_or_else(|| anyhow::anyhow!("Host name is empty"))
    }

    fn address(&self) -> anyhow::Result<String> {
        let out = run(Command::new("hostname").arg("-I"))?;
        first_token(&out).ok_or_else(|| anyhow::anyhow!("Host has no configured address"))
    }

    fn distro_codename(&self) -> anyhow::Result<String> {
        let content = std::fs::read_to_string(&self.os_release)
            .with_context(|| format!("Failed to read {}", self.os_release.display()))?;
        parse_codename(&content).ok_or_else(|| {
            anyhow::anyhow!(
                "No VERSION_CODENAME in {}",
                self.os_release.display()
            )
        })
    }
}

fn first_token(s: &str) -> Option<String> {
    s.split_whitespace().next().map(str::to_string)
}

/// Extract the release codename from os-release content.
pub fn parse_codename(os_release: &str) -> Option<String> {
    let lookup = |key: &str| {
        os_release.lines().find_map(|line| {
            let (k, v) = line.split_once('=')?;
            (k.trim() == key)
                .then(|| v.trim().trim_matches('"').to_string())
                .filter(|v| !v.is_empty())
        })
    };
    lookup("VERSION_CODENAME").or_else(|| lookup("UBUNTU_CODENAME"))
}
