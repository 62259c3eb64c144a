//! Installed-package records and the index rebuilt from them
//!
//! Every install writes one metadata file inside its own directory. There
//! is no central database; [`InstalledIndex::scan`] walks the install root
//! once per invocation and answers every query from memory.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, VpkgError};
use crate::registry::{PackageDescriptor, PackageKind, SyncSpec};

/// Sibling directories left behind by `remove --backup`
static BACKUP_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.backup\.\d{8}-\d{6}(\.\d+)?$").unwrap());

/// Persisted metadata for one installed package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstalledPackageRecord {
    pub name: String,
    pub version: String,
    pub installed_at: DateTime<Utc>,
    /// Install directory relative to the project root
    pub path: String,
    #[serde(rename = "type")]
    pub kind: PackageKind,
    /// Descriptor as it was at install time
    pub meta: PackageDescriptor,
}

impl InstalledPackageRecord {
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        serde_yaml_ng::from_str(content)
            .map_err(|e| VpkgError::schema(&path.display().to_string(), e))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| VpkgError::Config(format!("Failed to serialize install record: {e}")))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VpkgError::io(path, e))?;
        Self::from_yaml(&content, path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?).map_err(|e| VpkgError::io(path, e))
    }
}

/// A record together with where it was found
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPackage {
    pub record: InstalledPackageRecord,
    /// Directory holding the metadata file
    pub dir: PathBuf,
}

impl InstalledPackage {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn sync_hook(&self) -> Option<&SyncSpec> {
        self.record.meta.sync_hook()
    }
}

/// In-memory view of everything installed under one root
#[derive(Debug, Clone, Default)]
pub struct InstalledIndex {
    root: PathBuf,
    packages: BTreeMap<PathBuf, InstalledPackage>,
}

impl InstalledIndex {
    /// Walk `install_root` for `metadata_file` records
    ///
    /// Unreadable or malformed records are logged and skipped. Hidden
    /// directories and backup siblings are never descended into.
    pub fn scan(install_root: &Path, metadata_file: &str) -> Result<Self> {
        let mut packages = BTreeMap::new();

        if !install_root.exists() {
            return Ok(Self {
                root: install_root.to_path_buf(),
                packages,
            });
        }

        let walker = WalkDir::new(install_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", install_root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || entry.file_name() != metadata_file {
                continue;
            }

            let Some(dir) = entry.path().parent().map(Path::to_path_buf) else {
                continue;
            };

            match InstalledPackageRecord::load_from_path(entry.path()) {
                Ok(record) => {
                    tracing::debug!("Found {} {} in {}", record.name, record.version, dir.display());
                    packages.insert(dir.clone(), InstalledPackage { record, dir });
                }
                Err(e) => {
                    tracing::warn!("Ignoring malformed record {}: {}", entry.path().display(), e);
                }
            }
        }

        Ok(Self {
            root: install_root.to_path_buf(),
            packages,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All installs, ordered by package name then directory
    pub fn all(&self) -> Vec<&InstalledPackage> {
        let mut all: Vec<_> = self.packages.values().collect();
        all.sort_by(|a, b| a.record.name.cmp(&b.record.name).then(a.dir.cmp(&b.dir)));
        all
    }

    /// First install recorded under `name`
    pub fn get(&self, name: &str) -> Option<&InstalledPackage> {
        self.all().into_iter().find(|p| p.record.name == name)
    }

    pub fn by_dir(&self, dir: &Path) -> Option<&InstalledPackage> {
        self.packages.get(dir)
    }

    /// Installs declaring a sync hook, ordered by package name
    pub fn with_sync_hooks(&self) -> Vec<&InstalledPackage> {
        self.all()
            .into_iter()
            .filter(|p| p.sync_hook().is_some())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn is_excluded_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || is_backup_name(&name)
}

/// Whether a directory name is a `remove --backup` sibling
pub fn is_backup_name(name: &str) -> bool {
    BACKUP_DIR.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(name: &str, path: &str) -> InstalledPackageRecord {
        let meta: PackageDescriptor = serde_yaml_ng::from_str(&format!(
            "name: {name}\ntype: library-module\ntemplates: templates\nversion: 1.0.0\n"
        ))
        .unwrap();
        InstalledPackageRecord {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            installed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            path: path.to_string(),
            kind: PackageKind::LibraryModule,
            meta,
        }
    }

    fn install(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        record(name, &format!("vpkg/{name}"))
            .save_to_path(&dir.join("meta.yaml"))
            .unwrap();
        dir
    }

    #[test]
    fn test_record_yaml_field_names() {
        let yaml = record("acme/cache", "vpkg/acme/cache").to_yaml().unwrap();
        assert!(yaml.contains("installed_at:"));
        assert!(yaml.contains("2024-05-01T12:00:00Z"));
        assert!(yaml.contains("type: library-module"));
        assert!(yaml.contains("meta:"));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let index = InstalledIndex::scan(&temp_dir.path().join("vpkg"), "meta.yaml").unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_scan_finds_each_install_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("vpkg");
        install(&root, "acme/cache");
        install(&root, "acme/auth");
        install(&root, "beta/queue");

        let index = InstalledIndex::scan(&root, "meta.yaml").unwrap();
        let names: Vec<_> = index.all().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["acme/auth", "acme/cache", "beta/queue"]);
        assert_eq!(index.get("acme/cache").unwrap().dir, root.join("acme/cache"));
    }

    #[test]
    fn test_scan_skips_backups_hidden_and_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("vpkg");
        install(&root, "acme/cache");

        let backup = root.join("acme/auth.backup.20240501-120000");
        std::fs::create_dir_all(&backup).unwrap();
        record("acme/auth", "vpkg/acme/auth")
            .save_to_path(&backup.join("meta.yaml"))
            .unwrap();

        let staging = root.join("acme/.vpkg-staging-abc");
        std::fs::create_dir_all(&staging).unwrap();
        record("acme/tmp", "vpkg/acme/tmp")
            .save_to_path(&staging.join("meta.yaml"))
            .unwrap();

        let broken = root.join("acme/broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("meta.yaml"), "name: [oops").unwrap();

        let index = InstalledIndex::scan(&root, "meta.yaml").unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get("acme/cache").is_some());
    }

    #[test]
    fn test_backup_name_pattern() {
        assert!(is_backup_name("cache.backup.20240501-120000"));
        assert!(is_backup_name("cache.backup.20240501-120000.2"));
        assert!(!is_backup_name("cache.backup"));
        assert!(!is_backup_name("cache"));
    }
}
