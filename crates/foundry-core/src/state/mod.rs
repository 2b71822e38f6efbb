//! Persisted unit state.
//!
//! The controller is the only writer. State is loaded at the start of a
//! signal, mutated in place by the handler and saved once the transition
//! succeeds.

pub mod retry;
pub mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{StatusRecord, UnitStatus};

pub use retry::{DeferDecision, RetryLedger};
pub use store::{JsonStateStore, MemoryStateStore, StateStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub enabled: bool,
    /// Directory currently holding live application data.
    pub current_data_path: PathBuf,
    /// blake3 digest of the installed artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_digest: Option<String>,
    #[serde(default)]
    pub status: StatusRecord,
    #[serde(default)]
    pub retries: RetryLedger,
}

impl UnitState {
    pub fn new(default_data_path: PathBuf) -> Self {
        Self {
            installed: false,
            configured: false,
            started: false,
            enabled: false,
            current_data_path: default_data_path,
            artifact_digest: None,
            status: StatusRecord::default(),
            retries: RetryLedger::new(),
        }
    }

    pub fn status(&self) -> &UnitStatus {
        &self.status.status
    }

    pub fn set_status(&mut self, status: UnitStatus) {
        self.status = StatusRecord::now(status);
    }

    /// `started ⇒ configured ⇒ installed`
    pub fn check_invariants(&self) -> anyhow::Result<()> {
        if self.started && !self.configured {
            anyhow::bail!("unit is marked started but not configured");
        }
        if self.configured && !self.installed {
            anyhow::bail!("unit is marked configured but not installed");
        }
        if !self.current_data_path.is_absolute() {
            anyhow::bail!(
                "current data path must be absolute: {}",
                self.current_data_path.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> UnitState {
        UnitState::new(PathBuf::from("/opt/foundry/userdata"))
    }

    #[test]
    fn fresh_state_is_uninstalled() {
        let state = state();
        assert!(!state.installed);
        assert!(!state.configured);
        assert!(!state.started);
        assert!(!state.enabled);
        assert_eq!(state.status(), &UnitStatus::Unknown);
        state.check_invariants().unwrap();
    }

    #[test]
    fn started_without_configured_is_rejected() {
        let mut state = state();
        state.installed = true;
        state.started = true;
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn configured_without_installed_is_rejected() {
        let mut state = state();
        state.configured = true;
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn set_status_stamps_time() {
        let mut state = state();
        state.set_status(UnitStatus::active("Unit is ready"));
        assert!(state.status.updated_at.is_some());
        assert_eq!(state.status().message(), "Unit is ready");
    }
}
