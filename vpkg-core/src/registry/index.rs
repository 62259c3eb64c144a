//! Registry index parsing
//!
//! The index document does not list packages itself. It lists the
//! participating repositories, each of which hosts its own manifest.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VpkgError};

/// The top-level registry index (registry.yaml)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistryIndex {
    /// Index schema version
    #[serde(rename = "version", default)]
    pub schema_version: String,

    /// Canonical URL of this index
    #[serde(rename = "registry_url", default)]
    pub index_url: String,

    /// Participating repositories, in declared order
    #[serde(default)]
    pub repositories: Vec<RepositoryRef>,

    /// Known category tags
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// One repository entry in the index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryRef {
    pub name: String,

    /// Browsable repository URL (e.g. `https://github.com/acme/vpkg-packages`)
    #[serde(rename = "repository", default)]
    pub repository_url: String,

    /// URL of the repository manifest
    #[serde(rename = "meta_url")]
    pub manifest_url: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub verified: bool,
}

/// A category tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

impl RegistryIndex {
    /// Parse an index document fetched from `url`
    pub fn from_yaml(content: &str, url: &str) -> Result<Self> {
        let index: RegistryIndex =
            serde_yaml_ng::from_str(content).map_err(|e| VpkgError::schema(url, e))?;
        index.validate(url)?;
        Ok(index)
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| VpkgError::Config(format!("Failed to serialize registry index: {e}")))
    }

    fn validate(&self, url: &str) -> Result<()> {
        for repo in &self.repositories {
            if repo.name.trim().is_empty() {
                return Err(VpkgError::schema(url, "repository entry without a name"));
            }
            if repo.manifest_url.trim().is_empty() {
                return Err(VpkgError::schema(
                    url,
                    format!("repository '{}' has no meta_url", repo.name),
                ));
            }
        }
        Ok(())
    }

    /// Look up a repository by name
    pub fn repository(&self, name: &str) -> Option<&RepositoryRef> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Look up a tag by name (case-insensitive)
    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Number of repositories
    pub fn repository_count(&self) -> usize {
        self.repositories.len()
    }
}

impl RepositoryRef {
    /// Base URL that manifest-relative file paths are joined onto
    ///
    /// The manifest URL with its final path segment removed, so
    /// `https://host/acme/main/meta.yaml` becomes `https://host/acme/main`.
    pub fn base_url(&self) -> &str {
        match self.manifest_url.rsplit_once('/') {
            Some((base, _)) if !base.ends_with(':') && !base.ends_with('/') => base,
            _ => self.manifest_url.trim_end_matches('/'),
        }
    }
}
