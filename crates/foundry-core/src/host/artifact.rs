//! Install artifacts supplied as files in a resource directory.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::ArtifactSource;
use crate::error::ArtifactError;

/// Looks up `<name>.zip`, then `<name>`, inside a directory.
#[derive(Debug, Clone)]
pub struct ResourceDir {
    dir: PathBuf,
}

impl ResourceDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSource for ResourceDir {
    fn fetch(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        [self.dir.join(format!("{name}.zip")), self.dir.join(name)]
            .into_iter()
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ArtifactError::NotFound(name.to_string()))
    }
}

/// blake3 digest of a file, hex encoded.
pub fn artifact_digest(path: &Path) -> anyhow::Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open artifact: {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    hasher
        .update_reader(file)
        .with_context(|| format!("Failed to hash artifact: {}", path.display()))?;
    Ok(hasher.finalize().to_hex().to_string())
}
