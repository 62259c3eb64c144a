//! Repository manifest parsing (meta.yaml)
//!
//! Each repository listed in the index hosts one manifest enumerating its
//! installable packages.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::specifier::PackageSpec;
use crate::error::{Result, VpkgError};

/// Capability flag marking a package as providing a sync hook
pub const SYNC_CAPABILITY: &str = "sync-integration";

/// Entry point used for cli-command packages that declare none
pub const DEFAULT_ENTRY: &str = "cmd/main.go";

/// A repository manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryManifest {
    #[serde(rename = "version", default)]
    pub schema_version: String,

    #[serde(rename = "repository", default)]
    pub repository_url: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub license: String,

    #[serde(default)]
    pub packages: Vec<PackageDescriptor>,
}

/// What a package installs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageKind {
    /// Importable code wired into the consuming application
    #[serde(rename = "library-module", alias = "fx-module")]
    LibraryModule,

    /// A runnable command invoked through `vpkg exec`
    #[serde(rename = "cli-command")]
    CliCommand,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::LibraryModule => "library-module",
            PackageKind::CliCommand => "cli-command",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PackageKind {
    type Err = VpkgError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "library-module" | "fx-module" => Ok(PackageKind::LibraryModule),
            "cli-command" => Ok(PackageKind::CliCommand),
            other => Err(VpkgError::Config(format!(
                "Unknown package type '{other}'. Expected 'library-module' or 'cli-command'"
            ))),
        }
    }
}

/// Template root as declared in a manifest
///
/// Older manifests list the root as a one-element sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TemplatesField {
    Root(String),
    Roots(Vec<String>),
}

impl Default for TemplatesField {
    fn default() -> Self {
        TemplatesField::Root(String::new())
    }
}

/// Sync hook declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncSpec {
    /// Program or script, relative to the installed package directory
    pub provider: String,

    /// Interpreter command line prefixed to the provider (e.g. `go run`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,

    #[serde(default, alias = "commands", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// One installable package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageDescriptor {
    /// `namespace/short-name`
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type")]
    pub kind: PackageKind,

    #[serde(rename = "templates", default)]
    pub templates: TemplatesField,

    /// Suggested install location, relative to the project root
    #[serde(rename = "destination", default, skip_serializing_if = "Option::is_none")]
    pub destination_hint: Option<String>,

    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Entry point of a cli-command package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSpec>,
}

/// Criteria for listing available packages
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    pub kind: Option<PackageKind>,

    /// Keep packages carrying any of these tags
    pub tags: Vec<String>,

    /// Case-insensitive match over name, title, description and tags
    pub query: Option<String>,
}

impl RepositoryManifest {
    /// Parse a manifest fetched from `url`
    pub fn from_yaml(content: &str, url: &str) -> Result<Self> {
        let manifest: RepositoryManifest =
            serde_yaml_ng::from_str(content).map_err(|e| VpkgError::schema(url, e))?;
        manifest.validate(url)?;
        Ok(manifest)
    }

    /// Package names must be well-formed and unique within one manifest
    pub fn validate(&self, url: &str) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for package in &self.packages {
            PackageSpec::parse(&package.name).map_err(|e| VpkgError::schema(url, e))?;

            if !seen.insert(package.name.as_str()) {
                return Err(VpkgError::schema(
                    url,
                    format!("package '{}' is declared more than once", package.name),
                ));
            }

            if package.templates_root().is_empty() {
                return Err(VpkgError::schema(
                    url,
                    format!("package '{}' has no templates root", package.name),
                ));
            }
        }
        Ok(())
    }

    pub fn find_package(&self, name: &str) -> Option<&PackageDescriptor> {
        self.packages.iter().find(|p| p.name == name)
    }
}

impl PackageDescriptor {
    /// Template root relative to the repository base, without surrounding slashes
    pub fn templates_root(&self) -> &str {
        let root = match &self.templates {
            TemplatesField::Root(root) => root.as_str(),
            TemplatesField::Roots(roots) => roots.first().map(String::as_str).unwrap_or(""),
        };
        root.trim_matches('/')
    }

    pub fn namespace(&self) -> &str {
        self.name.split_once('/').map(|(ns, _)| ns).unwrap_or("")
    }

    pub fn short_name(&self) -> &str {
        self.name
            .split_once('/')
            .map(|(_, short)| short)
            .unwrap_or(&self.name)
    }

    pub fn entry(&self) -> &str {
        self.entry.as_deref().unwrap_or(DEFAULT_ENTRY)
    }

    /// The sync hook, if the package declares the capability and a provider
    pub fn sync_hook(&self) -> Option<&SyncSpec> {
        if !self.capabilities.iter().any(|c| c == SYNC_CAPABILITY) {
            return None;
        }
        self.sync.as_ref().filter(|s| !s.provider.trim().is_empty())
    }

    pub fn matches(&self, filter: &PackageFilter) -> bool {
        if let Some(kind) = filter.kind {
            if self.kind != kind {
                return false;
            }
        }

        if !filter.tags.is_empty()
            && !filter
                .tags
                .iter()
                .any(|wanted| self.tags.iter().any(|t| t.eq_ignore_ascii_case(wanted)))
        {
            return false;
        }

        if let Some(query) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            let query_lower = query.to_lowercase();
            let matches_name = self.name.to_lowercase().contains(&query_lower);
            let matches_title = self.title.to_lowercase().contains(&query_lower);
            let matches_desc = self.description.to_lowercase().contains(&query_lower);
            let matches_tag = self
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(&query_lower));

            if !(matches_name || matches_title || matches_desc || matches_tag) {
                return false;
            }
        }

        true
    }

    /// Truncate description to first line
    pub fn short_description(&self) -> &str {
        self.description
            .lines()
            .next()
            .unwrap_or(&self.description)
            .trim()
    }
}
