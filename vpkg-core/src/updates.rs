//! Comparing installed packages with what the registry currently offers

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Result, VpkgError};
use crate::registry::{PackageFilter, PackageResolver, PackageSpec, RegistryClient};
use crate::store::InstalledIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStatus {
    UpToDate,
    UpdateAvailable,
    /// Installed version is newer than the registry's
    Ahead,
    /// No reachable repository lists the package any more
    NotInRegistry,
}

/// Result for one installed package
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateCheck {
    pub name: String,
    pub installed: String,
    pub latest: Option<String>,
    pub repository: Option<String>,
    pub status: UpdateStatus,
}

pub struct UpdateChecker<'a> {
    client: &'a RegistryClient,
    project_root: PathBuf,
}

impl<'a> UpdateChecker<'a> {
    pub fn new(client: &'a RegistryClient, project_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            project_root: project_root.into(),
        }
    }

    /// Check `names`, or every installed package when empty
    pub async fn check(&self, names: &[String]) -> Result<Vec<UpdateCheck>> {
        let settings = self.client.settings();
        let install_root = self.project_root.join(&settings.install_root);
        let index = InstalledIndex::scan(&install_root, &settings.metadata_file)?;

        let selected = if names.is_empty() {
            index.all()
        } else {
            names
                .iter()
                .map(|name| {
                    let spec = PackageSpec::parse(name)?;
                    index.get(&spec.name()).ok_or_else(|| VpkgError::NotInstalled {
                        name: spec.name(),
                        path: install_root.join(&spec.namespace).join(&spec.short_name),
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        if selected.is_empty() {
            return Ok(Vec::new());
        }

        // First listing wins, matching resolution order
        let mut latest: HashMap<String, (String, String)> = HashMap::new();
        for available in PackageResolver::new(self.client)
            .list_available(&PackageFilter::default())
            .await?
        {
            latest
                .entry(available.descriptor.name.clone())
                .or_insert((available.descriptor.version, available.repository));
        }

        Ok(selected
            .into_iter()
            .map(|installed| {
                let record = &installed.record;
                match latest.get(&record.name) {
                    Some((version, repository)) => UpdateCheck {
                        name: record.name.clone(),
                        installed: record.version.clone(),
                        latest: Some(version.clone()),
                        repository: Some(repository.clone()),
                        status: compare_versions(&record.version, version),
                    },
                    None => UpdateCheck {
                        name: record.name.clone(),
                        installed: record.version.clone(),
                        latest: None,
                        repository: None,
                        status: UpdateStatus::NotInRegistry,
                    },
                }
            })
            .collect())
    }
}

/// Semver ordering when both sides parse, plain inequality otherwise
pub fn compare_versions(installed: &str, latest: &str) -> UpdateStatus {
    let parse = |v: &str| semver::Version::parse(v.trim().trim_start_matches('v')).ok();

    match (parse(installed), parse(latest)) {
        (Some(current), Some(newest)) => match current.cmp(&newest) {
            std::cmp::Ordering::Less => UpdateStatus::UpdateAvailable,
            std::cmp::Ordering::Equal => UpdateStatus::UpToDate,
            std::cmp::Ordering::Greater => UpdateStatus::Ahead,
        },
        _ if installed.trim() == latest.trim() => UpdateStatus::UpToDate,
        _ => UpdateStatus::UpdateAvailable,
    }
}
