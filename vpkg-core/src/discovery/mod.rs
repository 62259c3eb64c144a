//! Template discovery
//!
//! Enumerates the files under a package's template root. Strategies are
//! tried in a fixed order and the first one that finds anything wins; the
//! results of two strategies are never merged.
//!
//! 1. [`TreeStrategy`] - walks a directory-listing API, bounded depth
//! 2. [`ProbeStrategy`] - checks a fixed list of conventional file names

mod probe;
mod tree;

pub use probe::{candidate_paths, ProbeStrategy};
pub use tree::{github_coordinates, ContentEntry, TreeStrategy, MAX_TREE_DEPTH};

use async_trait::async_trait;

use crate::error::{Result, VpkgError};
use crate::registry::{PackageDescriptor, RegistryClient, RepositoryRef};

/// Recognized template suffixes, one per supported dialect
pub const TEMPLATE_SUFFIXES: &[&str] = &[".tmpl", ".templ", ".gotmpl"];

/// Outcome of a single strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Discovery {
    /// Paths relative to the template root, never empty
    Found(Vec<String>),
    Nothing { reason: String },
}

impl Discovery {
    /// Normalizes an empty list into `Nothing`
    pub fn from_files(mut files: Vec<String>, reason: impl Into<String>) -> Self {
        if files.is_empty() {
            Discovery::Nothing {
                reason: reason.into(),
            }
        } else {
            files.sort();
            files.dedup();
            Discovery::Found(files)
        }
    }
}

/// A way of enumerating a package's files
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    async fn discover(&self, repository: &RepositoryRef, package: &PackageDescriptor) -> Discovery;

    /// Strategy identifier for logging
    fn name(&self) -> &'static str;
}

/// Files found for a package, and which strategy found them
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredFiles {
    pub strategy: &'static str,
    pub files: Vec<String>,
}

/// The ordered strategy list
pub struct TemplateDiscovery {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl TemplateDiscovery {
    /// Tree walk first, probing as the fallback
    pub fn new(client: &RegistryClient) -> Self {
        Self::with_strategies(vec![
            Box::new(TreeStrategy::new(client.clone())),
            Box::new(ProbeStrategy::new(client.clone())),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        Self { strategies }
    }

    pub async fn discover(
        &self,
        repository: &RepositoryRef,
        package: &PackageDescriptor,
    ) -> Result<DiscoveredFiles> {
        let mut reasons = Vec::new();

        for strategy in &self.strategies {
            match strategy.discover(repository, package).await {
                Discovery::Found(files) => {
                    tracing::debug!(
                        "{} strategy found {} file(s) for {}",
                        strategy.name(),
                        files.len(),
                        package.name
                    );
                    return Ok(DiscoveredFiles {
                        strategy: strategy.name(),
                        files,
                    });
                }
                Discovery::Nothing { reason } => {
                    tracing::debug!(
                        "{} strategy found nothing for {}: {}",
                        strategy.name(),
                        package.name,
                        reason
                    );
                    reasons.push(format!("{}: {}", strategy.name(), reason));
                }
            }
        }

        tracing::warn!(
            "No template files for {} ({})",
            package.name,
            reasons.join("; ")
        );
        Err(VpkgError::NoTemplates {
            package: package.name.clone(),
            root: package.templates_root().to_string(),
        })
    }
}

/// The template suffix `path` ends with, if any
pub fn template_suffix(path: &str) -> Option<&'static str> {
    TEMPLATE_SUFFIXES
        .iter()
        .copied()
        .find(|suffix| path.ends_with(suffix) && path.len() > suffix.len())
}

/// Output path for a discovered file: template suffix removed, else unchanged
pub fn output_path(path: &str) -> &str {
    match template_suffix(path) {
        Some(suffix) => &path[..path.len() - suffix.len()],
        None => path,
    }
}
