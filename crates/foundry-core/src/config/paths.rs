//! Filesystem layout of an installed unit and default agent locations.

use std::path::{Component, Path, PathBuf};

pub const SERVICE_NAME: &str = "foundryvtt.service";
pub const RESOURCE_NAME: &str = "foundryvtt";
pub const CONFIG_FILE_NAME: &str = "foundry-agent.toml";
pub const STATE_FILE_NAME: &str = "unit-state.json";

/// Where the application, its data and its service unit live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub install_path: PathBuf,
    pub default_data_path: PathBuf,
    pub service_file: PathBuf,
    pub service_name: String,
    pub resource_name: String,
}

impl Default for InstallLayout {
    fn default() -> Self {
        Self {
            install_path: PathBuf::from("/opt/foundry/vtt"),
            default_data_path: PathBuf::from("/opt/foundry/userdata"),
            service_file: PathBuf::from("/etc/systemd/system").join(SERVICE_NAME),
            service_name: SERVICE_NAME.to_string(),
            resource_name: RESOURCE_NAME.to_string(),
        }
    }
}

impl InstallLayout {
    /// The default layout re-rooted under `root` (used for staging and tests).
    pub fn under_root(root: &Path) -> Self {
        let default = Self::default();
        Self {
            install_path: reroot(root, &default.install_path),
            default_data_path: reroot(root, &default.default_data_path),
            service_file: reroot(root, &default.service_file),
            ..default
        }
    }
}

/// Join an absolute path onto `root`, dropping its leading `/`.
pub fn reroot(root: &Path, path: &Path) -> PathBuf {
    let relative: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    root.join(relative)
}

/// Default directory holding `foundry-agent.toml`.
pub fn default_config_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(base.join("foundry-agent"))
}

/// Default directory holding persisted unit state.
///
/// - Unix: `$XDG_STATE_HOME/foundry-agent` or `~/.local/state/foundry-agent`
/// - elsewhere: the local data directory
pub fn default_state_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine state directory"))?;
    Ok(base.join("foundry-agent"))
}
