//! Status collection for the managed unit.
//!
//! Combines persisted state with the current configuration into a report
//! frontends can print or serialize.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AgentConfig, InstallLayout};
use crate::migration::migration_target;
use crate::state::{StateStore, UnitState};
use crate::types::{Signal, UnitStatus};

/// Overall unit status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: UnitStatus,
    pub updated_at: Option<DateTime<Utc>>,
    pub installed: bool,
    pub configured: bool,
    pub started: bool,
    pub enabled: bool,
    pub install_path: PathBuf,
    pub data_path: PathBuf,
    /// Set when the configured data path differs from the live one.
    pub pending_migration: Option<PathBuf>,
    pub deferred: Vec<Signal>,
    pub artifact_digest: Option<String>,
    pub service_file: PathBuf,
}

impl StatusReport {
    /// Lifecycle stage as a single word.
    pub fn stage(&self) -> &'static str {
        if self.started {
            "started"
        } else if self.configured {
            "configured"
        } else if self.installed {
            "installed"
        } else {
            "uninstalled"
        }
    }

    pub fn has_issues(&self) -> bool {
        self.status.is_blocked() || !self.deferred.is_empty()
    }
}

/// Build a report from an already loaded state.
pub fn collect_from_state(
    state: &UnitState,
    config: &AgentConfig,
    layout: &InstallLayout,
) -> StatusReport {
    let pending_migration = migration_target(
        config.custom_data_path(),
        &state.current_data_path,
        &layout.default_data_path,
    );

    StatusReport {
        status: state.status().clone(),
        updated_at: state.status.updated_at,
        installed: state.installed,
        configured: state.configured,
        started: state.started,
        enabled: state.enabled,
        install_path: layout.install_path.clone(),
        data_path: state.current_data_path.clone(),
        pending_migration,
        deferred: state.retries.pending().to_vec(),
        artifact_digest: state.artifact_digest.clone(),
        service_file: layout.service_file.clone(),
    }
}

/// Load state from `store` and build a report. A missing state file reports
/// a fresh uninstalled unit.
pub fn collect_status(
    store: &dyn StateStore,
    config: &AgentConfig,
    layout: &InstallLayout,
) -> anyhow::Result<StatusReport> {
    let state = store
        .load()?
        .unwrap_or_else(|| UnitState::new(layout.default_data_path.clone()));
    Ok(collect_from_state(&state, config, layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;

    #[test]
    fn empty_store_reports_uninstalled() {
        let layout = InstallLayout::default();
        let report =
            collect_status(&MemoryStateStore::new(), &AgentConfig::default(), &layout).unwrap();

        assert_eq!(report.stage(), "uninstalled");
        assert_eq!(report.data_path, layout.default_data_path);
        assert_eq!(report.pending_migration, None);
        assert!(!report.has_issues());
    }

    #[test]
    fn custom_path_shows_pending_migration() {
        let layout = InstallLayout::default();
        let mut state = UnitState::new(layout.default_data_path.clone());
        state.installed = true;

        let config = AgentConfig {
            custom_data_path: Some(PathBuf::from("/srv/foundry")),
            ..AgentConfig::default()
        };
        let report = collect_from_state(&state, &config, &layout);

        assert_eq!(report.stage(), "installed");
        assert_eq!(report.pending_migration, Some(PathBuf::from("/srv/foundry")));
    }

    #[test]
    fn deferred_signals_and_blocked_status_are_issues() {
        let layout = InstallLayout::default();
        let mut state = UnitState::new(layout.default_data_path.clone());
        state.retries.defer_or_drop(Signal::Start);
        let report = collect_from_state(&state, &AgentConfig::default(), &layout);
        assert_eq!(report.deferred, vec![Signal::Start]);
        assert!(report.has_issues());

        let mut state = UnitState::new(layout.default_data_path.clone());
        state.set_status(UnitStatus::blocked("Upload foundryvtt resource to proceed"));
        assert!(collect_from_state(&state, &AgentConfig::default(), &layout).has_issues());
    }
}
