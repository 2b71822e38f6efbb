//! Configuration schema for foundry-agent.toml
//!
//! Mirrors the operator-facing options of the deployed application:
//! data path override, reverse-proxy routing and the NodeSource apt
//! repository coordinates.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_NODE_REPO: &str = "https://deb.nodesource.com";
pub const DEFAULT_NODE_VERSION: &str = "12.x";
pub const DEFAULT_PROXY_SUBDOMAIN: &str = "foundry";
pub const DEFAULT_PROXY_PORT: u16 = 80;

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Override for the data directory. Empty means "use the default path".
    #[serde(deserialize_with = "empty_path_as_none")]
    pub custom_data_path: Option<PathBuf>,

    /// Subdomain the reverse proxy routes to this unit.
    pub proxy_subdomain: String,

    /// External port the proxy listens on.
    pub proxy_port: u16,

    /// Advertise the FQDN instead of the primary address as internal host.
    pub proxy_via_fqdn: bool,

    /// Optional URL base (must start with `/`).
    pub proxy_urlbase: Option<String>,

    /// Restrict the backend to local address ranges.
    pub proxy_acl_local: Option<bool>,

    /// Connect to the backend over TLS.
    pub proxy_ssl: Option<bool>,

    /// Let the proxy check port availability.
    pub proxy_check: Option<bool>,

    /// NodeSource apt repository base URL.
    pub node_repo: String,

    /// Signing key for `node_repo` (ASCII-armored block or key id).
    pub node_repo_key: Option<String>,

    /// NodeSource release line, e.g. `12.x`.
    pub node_version: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            custom_data_path: None,
            proxy_subdomain: DEFAULT_PROXY_SUBDOMAIN.to_string(),
            proxy_port: DEFAULT_PROXY_PORT,
            proxy_via_fqdn: true,
            proxy_urlbase: None,
            proxy_acl_local: None,
            proxy_ssl: None,
            proxy_check: None,
            node_repo: DEFAULT_NODE_REPO.to_string(),
            node_repo_key: None,
            node_version: DEFAULT_NODE_VERSION.to_string(),
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn custom_data_path(&self) -> Option<&Path> {
        self.custom_data_path.as_deref()
    }

    /// Apt source line for the configured NodeSource release on `codename`.
    pub fn apt_line(&self, codename: &str) -> String {
        format!(
            "deb {}/node_{} {} main",
            self.node_repo.trim_end_matches('/'),
            self.node_version,
            codename
        )
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let repo = url::Url::parse(&self.node_repo)
            .with_context(|| format!("node_repo is not a valid URL: '{}'", self.node_repo))?;
        if !matches!(repo.scheme(), "http" | "https") {
            anyhow::bail!("node_repo must use http or https, got '{}'", repo.scheme());
        }

        if self.node_version.trim().is_empty() {
            anyhow::bail!("node_version must not be empty");
        }

        if let Some(path) = &self.custom_data_path
            && !path.is_absolute()
        {
            anyhow::bail!(
                "custom_data_path must be an absolute path, got '{}'",
                path.display()
            );
        }

        if self.proxy_subdomain.trim().is_empty() && self.proxy_urlbase.is_none() {
            anyhow::bail!("Either proxy_subdomain or proxy_urlbase must be set");
        }

        if let Some(urlbase) = &self.proxy_urlbase
            && !urlbase.starts_with('/')
        {
            anyhow::bail!("proxy_urlbase must start with '/', got '{}'", urlbase);
        }

        if self.proxy_port == 0 {
            anyhow::bail!("proxy_port must be non-zero");
        }

        Ok(())
    }
}

fn empty_path_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from))
}
