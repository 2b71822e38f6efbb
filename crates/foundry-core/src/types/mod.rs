//! Shared core types used across the controller, state and CLI layers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle signal delivered by the host runtime (or the CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Signal {
    Install,
    ConfigChanged,
    Start,
    Upgrade,
    ProxyConnected,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::Install,
        Signal::ConfigChanged,
        Signal::Start,
        Signal::Upgrade,
        Signal::ProxyConnected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Install => "install",
            Signal::ConfigChanged => "config-changed",
            Signal::Start => "start",
            Signal::Upgrade => "upgrade",
            Signal::ProxyConnected => "proxy-connected",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signal::ALL
            .into_iter()
            .find(|signal| signal.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown signal: {}", s))
    }
}

/// Operator-visible workload status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    /// Nothing has happened yet.
    #[default]
    Unknown,
    /// Work in progress.
    Maintenance(String),
    /// Operator intervention required.
    Blocked(String),
    /// Workload is up.
    Active(String),
}

impl UnitStatus {
    pub fn maintenance(message: impl Into<String>) -> Self {
        Self::Maintenance(message.into())
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::Blocked(message.into())
    }

    pub fn active(message: impl Into<String>) -> Self {
        Self::Active(message.into())
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Unknown => "",
            Self::Maintenance(m) | Self::Blocked(m) | Self::Active(m) => m,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Maintenance(_) => "maintenance",
            Self::Blocked(_) => "blocked",
            Self::Active(_) => "active",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("Unknown"),
            Self::Blocked(m) => write!(f, "Blocked: {}", m),
            Self::Maintenance(m) | Self::Active(m) => f.write_str(m),
        }
    }
}

/// A status together with when it was set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: UnitStatus,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusRecord {
    pub fn now(status: UnitStatus) -> Self {
        Self {
            status,
            updated_at: Some(Utc::now()),
        }
    }
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self {
            status: UnitStatus::Unknown,
            updated_at: None,
        }
    }
}
