//! Zip extraction of the install artifact.

use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};

use super::ArchiveExtractor;
use crate::error::ArtifactError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> anyhow::Result<()> {
        let file = File::open(archive)
            .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| ArtifactError::CorruptArchive(e.to_string()))?;

        std::fs::create_dir_all(destination).with_context(|| {
            format!(
                "Failed to create extract directory: {}",
                destination.display()
            )
        })?;

        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| ArtifactError::CorruptArchive(format!("entry {i}: {e}")))?;

            // Entries escaping the destination are skipped.
            let Some(relative) = entry.enclosed_name() else {
                debug!(entry = entry.name(), "skipping unsafe archive path");
                continue;
            };
            let outpath = destination.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&outpath).with_context(|| {
                    format!("Failed to create directory: {}", outpath.display())
                })?;
                continue;
            }

            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directory: {}", parent.display())
                })?;
            }

            let mut outfile = File::create(&outpath)
                .with_context(|| format!("Failed to create file: {}", outpath.display()))?;
            io::copy(&mut entry, &mut outfile)
                .map_err(|e| ArtifactError::CorruptArchive(format!("{}: {e}", entry.name())))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode()
                    && let Err(err) =
                        std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                {
                    warn!(
                        path = %outpath.display(),
                        mode = %format!("{mode:o}"),
                        error = %err,
                        "could not apply archived permissions"
                    );
                }
            }
        }

        debug!(
            archive = %archive.display(),
            destination = %destination.display(),
            entries = zip.len(),
            "extracted archive"
        );
        Ok(())
    }
}
