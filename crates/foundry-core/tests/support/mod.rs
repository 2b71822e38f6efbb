#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;

use foundry_core::config::{AgentConfig, InstallLayout};
use foundry_core::host::{
    Host, HostIdentity, PackageManager, RelationFile, ResourceDir, ServiceManager,
    TemplateRenderer, ZipExtractor,
};
use foundry_core::lifecycle::LifecycleController;
use foundry_core::state::{MemoryStateStore, UnitState};

pub const FQDN: &str = "vtt.example.internal";
pub const ADDRESS: &str = "10.20.0.7";
pub const CODENAME: &str = "focal";

pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Failures the fakes inject, switchable mid-test.
#[derive(Debug, Default)]
pub struct Faults {
    pub fail_install: bool,
    pub fail_start: bool,
    /// Removed from disk when the service is stopped, like a lock file the
    /// application cleans up on shutdown.
    pub remove_on_stop: Option<PathBuf>,
}

pub type SharedFaults = Rc<RefCell<Faults>>;

pub struct RecordingPackages {
    calls: CallLog,
    faults: SharedFaults,
}

impl PackageManager for RecordingPackages {
    fn add_repository(&self, line: &str, _key: Option<&str>) -> anyhow::Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("apt add-repository {line}"));
        Ok(())
    }

    fn update(&self) -> anyhow::Result<()> {
        self.calls.borrow_mut().push("apt update".to_string());
        Ok(())
    }

    fn install_packages(&self, packages: &[&str]) -> anyhow::Result<()> {
        if self.faults.borrow().fail_install {
            anyhow::bail!("E: Unable to locate package {}", packages.join(" "));
        }
        self.calls
            .borrow_mut()
            .push(format!("apt install {}", packages.join(" ")));
        Ok(())
    }
}

pub struct RecordingServices {
    calls: CallLog,
    faults: SharedFaults,
}

impl ServiceManager for RecordingServices {
    fn enable(&self, name: &str) -> anyhow::Result<()> {
        self.calls.borrow_mut().push(format!("systemctl enable {name}"));
        Ok(())
    }

    fn start(&self, name: &str) -> anyhow::Result<()> {
        if self.faults.borrow().fail_start {
            anyhow::bail!("Job for {name} failed because the control process exited with error code");
        }
        self.calls.borrow_mut().push(format!("systemctl start {name}"));
        Ok(())
    }

    fn stop(&self, name: &str) -> anyhow::Result<()> {
        self.calls.borrow_mut().push(format!("systemctl stop {name}"));
        if let Some(path) = self.faults.borrow_mut().remove_on_stop.take() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn daemon_reload(&self) -> anyhow::Result<()> {
        self.calls
            .borrow_mut()
            .push("systemctl daemon-reload".to_string());
        Ok(())
    }
}

pub struct FixedIdentity;

impl HostIdentity for FixedIdentity {
    fn fqdn(&self) -> anyhow::Result<String> {
        Ok(FQDN.to_string())
    }

    fn address(&self) -> anyhow::Result<String> {
        Ok(ADDRESS.to_string())
    }

    fn distro_codename(&self) -> anyhow::Result<String> {
        Ok(CODENAME.to_string())
    }
}

/// A unit staged under a temp root with recording package and service
/// managers. Files are real; system commands are not.
pub struct Harness {
    pub temp: TempDir,
    pub layout: InstallLayout,
    pub resource_dir: PathBuf,
    pub relation_file: PathBuf,
    pub calls: CallLog,
    pub faults: SharedFaults,
    pub store: Rc<MemoryStateStore>,
}

impl Harness {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let layout = InstallLayout::under_root(temp.path());
        let resource_dir = temp.path().join("resources");
        let relation_file = temp.path().join("relations/reverseproxy.json");
        Self {
            temp,
            layout,
            resource_dir,
            relation_file,
            calls: Rc::new(RefCell::new(Vec::new())),
            faults: Rc::new(RefCell::new(Faults::default())),
            store: Rc::new(MemoryStateStore::new()),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn controller(&self) -> LifecycleController {
        LifecycleController::new(
            self.layout.clone(),
            self.host(),
            Box::new(Rc::clone(&self.store)),
        )
    }

    pub fn controller_with_failing_packages(&self) -> LifecycleController {
        self.faults.borrow_mut().fail_install = true;
        self.controller()
    }

    /// Collaborators for this harness, failing as `faults` says.
    pub fn host(&self) -> Host {
        Host {
            artifacts: Box::new(ResourceDir::new(self.resource_dir.clone())),
            extractor: Box::new(ZipExtractor::new()),
            packages: Box::new(RecordingPackages {
                calls: Rc::clone(&self.calls),
                faults: Rc::clone(&self.faults),
            }),
            renderer: Box::new(TemplateRenderer::new()),
            services: Box::new(RecordingServices {
                calls: Rc::clone(&self.calls),
                faults: Rc::clone(&self.faults),
            }),
            proxy: Box::new(RelationFile::new(self.relation_file.clone())),
            identity: Box::new(FixedIdentity),
        }
    }

    /// Upload a minimal application archive.
    pub fn upload_archive(&self) {
        std::fs::create_dir_all(&self.resource_dir).unwrap();
        let file = std::fs::File::create(self.resource_dir.join("foundryvtt.zip")).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);

        zip.start_file("resources/app/main.js", options).unwrap();
        zip.write_all(b"require('./dist/init.mjs');").unwrap();
        zip.start_file("resources/app/package.json", options).unwrap();
        zip.write_all(br#"{"name":"foundryvtt","version":"0.7.9"}"#)
            .unwrap();
        zip.finish().unwrap();
    }

    /// Upload something that is not a zip archive.
    pub fn upload_corrupt_archive(&self) {
        std::fs::create_dir_all(&self.resource_dir).unwrap();
        std::fs::write(self.resource_dir.join("foundryvtt.zip"), b"").unwrap();
    }

    pub fn state(&self) -> UnitState {
        self.store
            .snapshot()
            .unwrap_or_else(|| UnitState::new(self.layout.default_data_path.clone()))
    }

    pub fn persisted(&self) -> Option<UnitState> {
        self.store.snapshot()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn count_calls(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn service_unit(&self) -> String {
        std::fs::read_to_string(&self.layout.service_file).unwrap()
    }

    /// Create an empty directory under the temp root.
    pub fn empty_dir(&self, relative: &str) -> PathBuf {
        let dir = self.root().join(relative);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

pub fn config() -> AgentConfig {
    AgentConfig::default()
}

pub fn config_with_data_path(path: &Path) -> AgentConfig {
    AgentConfig {
        custom_data_path: Some(path.to_path_buf()),
        ..AgentConfig::default()
    }
}
