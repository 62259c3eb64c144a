//! Staging directory for an install in progress
//!
//! Files are written to a hidden sibling of the destination and moved into
//! place only once every file rendered. Dropping the stage without
//! committing removes it along with everything written so far.

use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{Result, VpkgError};

pub const STAGING_PREFIX: &str = ".vpkg-staging-";

pub struct Stage {
    dir: TempDir,
}

impl Stage {
    /// Create a stage next to `destination`
    pub fn next_to(destination: &Path) -> Result<Self> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| VpkgError::io(parent, e))?;

        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| VpkgError::io(parent, e))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `bytes` at `relative` inside the stage
    ///
    /// `relative` must be a plain relative path; anything that could resolve
    /// outside the stage is refused.
    pub fn write(&self, relative: &str, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.dir.path().join(relative);
        let contained = !relative.is_empty()
            && Path::new(relative)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(VpkgError::io(
                &target,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("refusing to write {relative:?} outside the staging directory"),
                ),
            ));
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VpkgError::io(parent, e))?;
        }
        std::fs::write(&target, bytes).map_err(|e| VpkgError::io(&target, e))?;
        Ok(target)
    }

    /// Move every staged file into `destination`, replacing same-named files
    ///
    /// Returns the committed paths relative to `destination`.
    pub fn commit(self, destination: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(destination).map_err(|e| VpkgError::io(destination, e))?;

        let mut committed = Vec::new();
        for entry in WalkDir::new(self.dir.path()).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(self.dir.path()).to_path_buf();
                VpkgError::io(path, std::io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(self.dir.path())
                .map_err(|e| VpkgError::io(entry.path(), std::io::Error::other(e.to_string())))?
                .to_path_buf();
            let target = destination.join(&relative);

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| VpkgError::io(parent, e))?;
            }
            if target.is_dir() {
                std::fs::remove_dir_all(&target).map_err(|e| VpkgError::io(&target, e))?;
            }
            std::fs::rename(entry.path(), &target).map_err(|e| VpkgError::io(&target, e))?;
            committed.push(relative);
        }

        // TempDir drop removes the now-empty stage
        Ok(committed)
    }
}
