//! Collaborators the controller drives on the host machine.
//!
//! Each concern sits behind a narrow trait so the lifecycle logic can be
//! exercised without touching apt, systemd or the network. The shipped
//! implementations shell out to the usual system tools.

pub mod apt;
pub mod archive;
pub mod artifact;
pub mod command;
pub mod identity;
pub mod proxy;
pub mod systemd;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ArtifactError;

pub use apt::Apt;
pub use archive::ZipExtractor;
pub use artifact::{ResourceDir, artifact_digest};
pub use identity::SystemHost;
pub use proxy::{INTERNAL_PORT, PROXY_MODE, ProxyAdvertisement, RelationFile};
pub use systemd::{Systemctl, TemplateRenderer};

/// Supplies the install artifact by name.
pub trait ArtifactSource {
    fn fetch(&self, name: &str) -> Result<PathBuf, ArtifactError>;
}

/// Unpacks an artifact. A malformed archive must surface as
/// [`ArtifactError::CorruptArchive`] somewhere in the error chain.
pub trait ArchiveExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> anyhow::Result<()>;
}

/// OS package manager.
pub trait PackageManager {
    fn add_repository(&self, line: &str, key: Option<&str>) -> anyhow::Result<()>;
    fn update(&self) -> anyhow::Result<()>;
    fn install_packages(&self, packages: &[&str]) -> anyhow::Result<()>;
}

/// Writes a service unit from a named template.
pub trait UnitRenderer {
    fn render(
        &self,
        template: &str,
        destination: &Path,
        context: &BTreeMap<String, String>,
        mode: u32,
    ) -> anyhow::Result<()>;
}

/// Service manager controlling the workload.
pub trait ServiceManager {
    fn enable(&self, name: &str) -> anyhow::Result<()>;
    fn start(&self, name: &str) -> anyhow::Result<()>;
    fn stop(&self, name: &str) -> anyhow::Result<()>;
    fn daemon_reload(&self) -> anyhow::Result<()>;
}

/// Reverse-proxy peer.
pub trait ProxyRelation {
    fn publish(&self, advertisement: &ProxyAdvertisement) -> anyhow::Result<()>;
}

/// Facts about the machine the unit runs on.
pub trait HostIdentity {
    fn fqdn(&self) -> anyhow::Result<String>;
    fn address(&self) -> anyhow::Result<String>;
    fn distro_codename(&self) -> anyhow::Result<String>;
}

/// The full set of collaborators handed to the controller.
pub struct Host {
    pub artifacts: Box<dyn ArtifactSource>,
    pub extractor: Box<dyn ArchiveExtractor>,
    pub packages: Box<dyn PackageManager>,
    pub renderer: Box<dyn UnitRenderer>,
    pub services: Box<dyn ServiceManager>,
    pub proxy: Box<dyn ProxyRelation>,
    pub identity: Box<dyn HostIdentity>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
