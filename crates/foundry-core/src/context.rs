//! Agent context for unified dependency injection.

use std::path::{Path, PathBuf};

use crate::config::{ConfigStore, InstallLayout, default_config_dir, default_state_dir};
use crate::config::paths::{CONFIG_FILE_NAME, reroot};
use crate::host::{
    Apt, Host, RelationFile, ResourceDir, SystemHost, Systemctl, TemplateRenderer, ZipExtractor,
};
use crate::lifecycle::LifecycleController;
use crate::state::JsonStateStore;

const RELATION_FILE_NAME: &str = "reverseproxy.json";
const RESOURCE_DIR_NAME: &str = "resources";

/// Paths the agent works with. Frontends create this once and build the
/// controller and stores from it.
#[derive(Debug, Clone)]
pub struct AgentContext {
    layout: InstallLayout,
    config_path: PathBuf,
    state_dir: PathBuf,
    resource_dir: PathBuf,
    relation_file: PathBuf,
    root: Option<PathBuf>,
}

impl AgentContext {
    /// Create a context with explicit paths.
    pub fn new(
        layout: InstallLayout,
        config_path: PathBuf,
        state_dir: PathBuf,
        resource_dir: PathBuf,
        relation_file: PathBuf,
    ) -> Self {
        Self {
            layout,
            config_path,
            state_dir,
            resource_dir,
            relation_file,
            root: None,
        }
    }

    /// Default locations: packaged layout, XDG config and state dirs.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let state_dir = default_state_dir()?;
        Ok(Self::new(
            InstallLayout::default(),
            default_config_dir()?.join(CONFIG_FILE_NAME),
            state_dir.clone(),
            state_dir.join(RESOURCE_DIR_NAME),
            state_dir.join(RELATION_FILE_NAME),
        ))
    }

    /// Everything, including system files, lives under `root`.
    pub fn under_root(root: &Path) -> Self {
        let state_dir = root.join("var/lib/foundry-agent");
        Self {
            layout: InstallLayout::under_root(root),
            config_path: root.join("etc/foundry-agent").join(CONFIG_FILE_NAME),
            resource_dir: state_dir.join(RESOURCE_DIR_NAME),
            relation_file: state_dir.join(RELATION_FILE_NAME),
            state_dir,
            root: Some(root.to_path_buf()),
        }
    }

    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_state_dir(mut self, dir: PathBuf) -> Self {
        self.state_dir = dir;
        self
    }

    pub fn with_resource_dir(mut self, dir: PathBuf) -> Self {
        self.resource_dir = dir;
        self
    }

    pub fn with_relation_file(mut self, path: PathBuf) -> Self {
        self.relation_file = path;
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn resource_dir(&self) -> &Path {
        &self.resource_dir
    }

    pub fn relation_file(&self) -> &Path {
        &self.relation_file
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::from_path(self.config_path.clone())
    }

    pub fn state_store(&self) -> JsonStateStore {
        JsonStateStore::in_dir(&self.state_dir)
    }

    /// Collaborators backed by the real system tools.
    pub fn system_host(&self) -> Host {
        let apt = match &self.root {
            Some(root) => Apt::with_dirs(
                "nodesource",
                reroot(root, Path::new("/etc/apt/sources.list.d")),
                reroot(root, Path::new("/etc/apt/trusted.gpg.d")),
            ),
            None => Apt::new(),
        };
        Host {
            artifacts: Box::new(ResourceDir::new(self.resource_dir.clone())),
            extractor: Box::new(ZipExtractor::new()),
            packages: Box::new(apt),
            renderer: Box::new(TemplateRenderer::new()),
            services: Box::new(Systemctl::new()),
            proxy: Box::new(RelationFile::new(self.relation_file.clone())),
            identity: Box::new(SystemHost::new()),
        }
    }

    /// Controller wired to the system collaborators and the JSON state file.
    pub fn controller(&self) -> LifecycleController {
        self.controller_with(self.system_host())
    }

    pub fn controller_with(&self, host: Host) -> LifecycleController {
        LifecycleController::new(
            self.layout.clone(),
            host,
            Box::new(self.state_store()),
        )
    }
}
