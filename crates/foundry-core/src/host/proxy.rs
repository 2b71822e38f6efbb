//! Reverse-proxy advertisement.
//!
//! The proxy peer consumes a flat string record:
//!
//! | key | meaning |
//! |-----|---------|
//! | `mode` | routing mode, always `http` |
//! | `subdomain` | subdomain routed to this unit |
//! | `urlbase` | path prefix routed to this unit (leading `/`) |
//! | `external_port` | port the proxy listens on |
//! | `internal_host` | host to forward to |
//! | `internal_port` | port to forward to |
//! | `acl-local` | restrict to local address ranges |
//! | `ssl` | connect to the backend over TLS |
//! | `check` | perform port availability checks |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::ProxyRelation;
use crate::config::AgentConfig;

/// Port the application listens on.
pub const INTERNAL_PORT: u16 = 30000;

/// The application is only ever routed as HTTP.
pub const PROXY_MODE: &str = "http";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAdvertisement {
    pub subdomain: Option<String>,
    pub urlbase: Option<String>,
    pub external_port: u16,
    pub internal_host: String,
    pub internal_port: u16,
    pub acl_local: Option<bool>,
    pub ssl: Option<bool>,
    pub check: Option<bool>,
}

impl ProxyAdvertisement {
    /// Build the advertisement for the active configuration.
    pub fn from_config(config: &AgentConfig, internal_host: String) -> Self {
        let subdomain = Some(config.proxy_subdomain.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self {
            subdomain,
            urlbase: config.proxy_urlbase.clone(),
            external_port: config.proxy_port,
            internal_host,
            internal_port: INTERNAL_PORT,
            acl_local: config.proxy_acl_local,
            ssl: config.proxy_ssl,
            check: config.proxy_check,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.subdomain.is_none() && self.urlbase.is_none() {
            anyhow::bail!("Proxy advertisement needs a subdomain or a urlbase");
        }
        if self.internal_host.trim().is_empty() {
            anyhow::bail!("Proxy advertisement needs an internal host");
        }
        Ok(())
    }

    /// Flatten into the relation wire record.
    pub fn to_relation_data(&self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert("mode".to_string(), PROXY_MODE.to_string());
        if let Some(subdomain) = &self.subdomain {
            data.insert("subdomain".to_string(), subdomain.clone());
        }
        if let Some(urlbase) = &self.urlbase {
            data.insert("urlbase".to_string(), urlbase.clone());
        }
        data.insert("external_port".to_string(), self.external_port.to_string());
        data.insert("internal_host".to_string(), self.internal_host.clone());
        data.insert("internal_port".to_string(), self.internal_port.to_string());
        for (key, flag) in [
            ("acl-local", self.acl_local),
            ("ssl", self.ssl),
            ("check", self.check),
        ] {
            if let Some(flag) = flag {
                data.insert(key.to_string(), flag.to_string());
            }
        }
        data
    }
}

/// Publishes the relation record as a JSON object in a file.
#[derive(Debug, Clone)]
pub struct RelationFile {
    path: PathBuf,
}

impl RelationFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read relation data: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse relation data: {}", self.path.display()))
    }
}

impl ProxyRelation for RelationFile {
    fn publish(&self, advertisement: &ProxyAdvertisement) -> anyhow::Result<()> {
        advertisement.validate()?;
        let data = advertisement.to_relation_data();
        let content =
            serde_json::to_string_pretty(&data).context("Failed to serialize relation data")?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write relation data: {}", self.path.display()))
    }
}
