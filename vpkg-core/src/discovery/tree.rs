//! Directory-listing discovery over the GitHub contents API

use async_trait::async_trait;
use serde::Deserialize;

use super::{Discovery, DiscoveryStrategy};
use crate::registry::{join_url, PackageDescriptor, RegistryClient, RepositoryRef};

/// Listing levels walked below and including the template root
pub const MAX_TREE_DEPTH: usize = 3;

/// One item of a contents-API directory listing
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,

    #[serde(rename = "type")]
    pub entry_type: String,
}

pub struct TreeStrategy {
    client: RegistryClient,
}

impl TreeStrategy {
    pub fn new(client: RegistryClient) -> Self {
        Self { client }
    }

    fn listing_url(&self, owner: &str, repo: &str, dir: &str) -> String {
        let settings = self.client.settings();
        let base = join_url(
            &settings.contents_api_url,
            &format!("repos/{owner}/{repo}/contents"),
        );
        format!("{}?ref={}", join_url(&base, dir), settings.default_branch)
    }
}

#[async_trait]
impl DiscoveryStrategy for TreeStrategy {
    async fn discover(&self, repository: &RepositoryRef, package: &PackageDescriptor) -> Discovery {
        let Some((owner, repo)) = github_coordinates(repository) else {
            return Discovery::Nothing {
                reason: format!("repository '{}' has no directory-listing API", repository.name),
            };
        };

        let root = package.templates_root();
        let mut files = Vec::new();
        // (path relative to root, listing level)
        let mut pending: Vec<(String, usize)> = vec![(String::new(), 1)];

        while let Some((relative, depth)) = pending.pop() {
            let dir = if relative.is_empty() {
                root.to_string()
            } else {
                format!("{root}/{relative}")
            };
            let url = self.listing_url(&owner, &repo, &dir);

            let entries: Vec<ContentEntry> = match self.client.get_json(&url).await {
                Ok(entries) => entries,
                Err(e) if depth == 1 => {
                    return Discovery::Nothing {
                        reason: format!("listing {dir} failed: {e}"),
                    };
                }
                Err(e) => {
                    tracing::warn!("Skipping {} during tree walk: {}", dir, e);
                    continue;
                }
            };

            for entry in entries {
                if !is_plain_name(&entry.name) {
                    tracing::warn!("Ignoring listed entry {:?} under {}", entry.name, dir);
                    continue;
                }
                let path = if relative.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{relative}/{}", entry.name)
                };

                match entry.entry_type.as_str() {
                    "file" => files.push(path),
                    "dir" if depth < MAX_TREE_DEPTH => pending.push((path, depth + 1)),
                    "dir" => tracing::debug!("Not descending into {} (depth limit)", path),
                    _ => {}
                }
            }
        }

        Discovery::from_files(files, format!("no files listed under {root}"))
    }

    fn name(&self) -> &'static str {
        "tree"
    }
}

/// A single path segment that stays inside its directory
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// `(owner, repo)` when the repository is hosted on GitHub
///
/// Checks the repository URL first, then a raw.githubusercontent.com
/// manifest URL.
pub fn github_coordinates(repository: &RepositoryRef) -> Option<(String, String)> {
    let from = |url: &str, host: &str| -> Option<(String, String)> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?
            .strip_prefix(host)?
            .strip_prefix('/')?;
        let mut parts = rest.split('/');
        let owner = parts.next().filter(|s| !s.is_empty())?;
        let repo = parts.next().filter(|s| !s.is_empty())?;
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        Some((owner.to_string(), repo.to_string()))
    };

    from(&repository.repository_url, "github.com")
        .or_else(|| from(&repository.manifest_url, "raw.githubusercontent.com"))
}
