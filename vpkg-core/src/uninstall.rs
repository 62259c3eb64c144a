//! Removing installed packages

use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::{Result, VpkgError};
use crate::registry::PackageSpec;
use crate::store::InstalledIndex;

/// What `remove` did
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub name: String,
    pub path: PathBuf,
    /// Where the content went, when backed up instead of deleted
    pub backup: Option<PathBuf>,
}

pub struct Uninstaller {
    project_root: PathBuf,
    settings: Settings,
}

impl Uninstaller {
    pub fn new(project_root: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            project_root: project_root.into(),
            settings: settings.clone(),
        }
    }

    fn install_root(&self) -> PathBuf {
        self.project_root.join(&self.settings.install_root)
    }

    /// Directory holding `name`
    ///
    /// The conventional `{install_root}/{namespace}/{name}` location first,
    /// then any install recorded under that name elsewhere in the root.
    pub fn locate(&self, name: &str) -> Result<PathBuf> {
        let spec = PackageSpec::parse(name)?;
        let conventional = self
            .install_root()
            .join(&spec.namespace)
            .join(&spec.short_name);
        if conventional.is_dir() {
            return Ok(conventional);
        }

        let index = InstalledIndex::scan(&self.install_root(), &self.settings.metadata_file)?;
        index
            .get(&spec.name())
            .map(|p| p.dir.clone())
            .ok_or_else(|| VpkgError::NotInstalled {
                name: spec.name(),
                path: conventional,
            })
    }

    /// Delete an installed package, or move it aside when `backup` is set
    pub fn remove(&self, name: &str, backup: bool) -> Result<Removed> {
        let path = self.locate(name)?;
        let name = PackageSpec::parse(name)?.name();

        if backup {
            let backup_path = backup_path_for(&path, Local::now().naive_local());
            std::fs::rename(&path, &backup_path).map_err(|e| VpkgError::io(&path, e))?;
            tracing::info!("Backed up {} to {}", name, backup_path.display());
            return Ok(Removed {
                name,
                path,
                backup: Some(backup_path),
            });
        }

        std::fs::remove_dir_all(&path).map_err(|e| VpkgError::io(&path, e))?;
        tracing::info!("Removed {} from {}", name, path.display());
        Ok(Removed {
            name,
            path,
            backup: None,
        })
    }
}

/// `{path}.backup.{YYYYMMDD-HHMMSS}`, with a counter when that exists
fn backup_path_for(path: &Path, now: NaiveDateTime) -> PathBuf {
    let stamp = now.format("%Y%m%d-%H%M%S");
    let base = format!("{}.backup.{stamp}", path.display());

    let candidate = PathBuf::from(&base);
    if !candidate.exists() {
        return candidate;
    }
    (2..)
        .map(|n| PathBuf::from(format!("{base}.{n}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
