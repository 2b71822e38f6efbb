//! Durable storage for [`UnitState`].

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::UnitState;
use crate::config::paths::STATE_FILE_NAME;

/// Durable key/value record surviving restarts. Only the controller reads
/// and writes it.
pub trait StateStore {
    /// `None` when nothing has been persisted yet.
    fn load(&self) -> anyhow::Result<Option<UnitState>>;

    fn save(&self, state: &UnitState) -> anyhow::Result<()>;
}

/// JSON file in the agent's state directory.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> anyhow::Result<Option<UnitState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read unit state: {}", self.path.display()))?;
        let state: UnitState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse unit state: {}", self.path.display()))?;
        state
            .check_invariants()
            .with_context(|| format!("Inconsistent unit state in {}", self.path.display()))?;
        Ok(Some(state))
    }

    fn save(&self, state: &UnitState) -> anyhow::Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("State path has no parent: {}", self.path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;

        let content =
            serde_json::to_string_pretty(state).context("Failed to serialize unit state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write unit state: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!(
                "Failed to move unit state into place: {}",
                self.path.display()
            )
        })?;
        Ok(())
    }
}

/// Process-local store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RefCell<Option<UnitState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: UnitState) -> Self {
        Self {
            state: RefCell::new(Some(state)),
        }
    }

    pub fn snapshot(&self) -> Option<UnitState> {
        self.state.borrow().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> anyhow::Result<Option<UnitState>> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, state: &UnitState) -> anyhow::Result<()> {
        *self.state.borrow_mut() = Some(state.clone());
        Ok(())
    }
}

impl<T: StateStore + ?Sized> StateStore for std::rc::Rc<T> {
    fn load(&self) -> anyhow::Result<Option<UnitState>> {
        (**self).load()
    }

    fn save(&self, state: &UnitState) -> anyhow::Result<()> {
        (**self).save(state)
    }
}
