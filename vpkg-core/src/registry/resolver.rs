//! Mapping package specifiers onto the repository that hosts them
//!
//! Repositories are visited strictly in the order the index declares them
//! and manifests are fetched one at a time, so the first declared match
//! always wins regardless of how quickly each repository answers.

use super::{
    PackageDescriptor, PackageFilter, PackageSpec, RegistryClient, RegistryIndex, RepositoryRef,
};
use crate::error::{Result, VpkgError};

/// A specifier matched to its hosting repository
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub spec: PackageSpec,
    pub repository: RepositoryRef,
    pub descriptor: PackageDescriptor,
}

impl ResolvedPackage {
    /// Effective version: specifier suffix, then caller option, then descriptor
    pub fn effective_version(&self, requested: Option<&str>) -> String {
        self.spec
            .version
            .clone()
            .or_else(|| requested.filter(|v| !v.is_empty()).map(str::to_string))
            .unwrap_or_else(|| self.descriptor.version.clone())
    }
}

/// An available package together with the repository listing it
#[derive(Debug, Clone)]
pub struct AvailablePackage {
    pub repository: String,
    pub descriptor: PackageDescriptor,
}

pub struct PackageResolver<'a> {
    client: &'a RegistryClient,
}

impl<'a> PackageResolver<'a> {
    pub fn new(client: &'a RegistryClient) -> Self {
        Self { client }
    }

    /// Resolve a specifier string
    pub async fn resolve(&self, specifier: &str) -> Result<ResolvedPackage> {
        let spec = PackageSpec::parse(specifier)?;
        let index = self.client.fetch_index().await?;
        self.resolve_in(&index, spec).await
    }

    /// Resolve against an already fetched index
    pub async fn resolve_in(&self, index: &RegistryIndex, spec: PackageSpec) -> Result<ResolvedPackage> {
        let name = spec.name();

        for repository in &index.repositories {
            let manifest = match self.client.fetch_manifest(&repository.manifest_url).await {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!(
                        "Skipping repository '{}' while resolving {}: {}",
                        repository.name,
                        name,
                        e
                    );
                    continue;
                }
            };

            if let Some(descriptor) = manifest.find_package(&name) {
                tracing::debug!("Resolved {} in repository '{}'", name, repository.name);
                return Ok(ResolvedPackage {
                    spec,
                    repository: repository.clone(),
                    descriptor: descriptor.clone(),
                });
            }
        }

        Err(VpkgError::PackageNotFound(name))
    }

    /// Every package across all reachable repositories that passes `filter`
    pub async fn list_available(&self, filter: &PackageFilter) -> Result<Vec<AvailablePackage>> {
        let index = self.client.fetch_index().await?;
        let mut packages = Vec::new();

        for repository in &index.repositories {
            let manifest = match self.client.fetch_manifest(&repository.manifest_url).await {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!("Failed to fetch repository '{}': {}", repository.name, e);
                    continue;
                }
            };

            packages.extend(
                manifest
                    .packages
                    .into_iter()
                    .filter(|p| p.matches(filter))
                    .map(|descriptor| AvailablePackage {
                        repository: repository.name.clone(),
                        descriptor,
                    }),
            );
        }

        Ok(packages)
    }
}
