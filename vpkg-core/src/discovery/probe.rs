//! Heuristic discovery by probing conventional file names

use async_trait::async_trait;

use super::{Discovery, DiscoveryStrategy, TEMPLATE_SUFFIXES};
use crate::registry::{join_url, PackageDescriptor, RegistryClient, RepositoryRef};

/// Conventional entry files, relative to the template root
const CONVENTIONAL_FILES: &[&str] = &[
    "main.go",
    "service.go",
    "module.go",
    "handler.go",
    "config.go",
    "README.md",
    "cmd/main.go",
    "internal/service.go",
];

/// Static files probed without a template suffix
const STATIC_FILES: &[&str] = &["README.md"];

pub struct ProbeStrategy {
    client: RegistryClient,
}

impl ProbeStrategy {
    pub fn new(client: RegistryClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiscoveryStrategy for ProbeStrategy {
    async fn discover(&self, repository: &RepositoryRef, package: &PackageDescriptor) -> Discovery {
        let root = join_url(repository.base_url(), package.templates_root());
        let mut found = Vec::new();

        for candidate in candidate_paths(package.short_name()) {
            if self.client.probe(&join_url(&root, &candidate)).await {
                found.push(candidate);
            }
        }

        Discovery::from_files(found, "no conventional file names exist")
    }

    fn name(&self) -> &'static str {
        "probe"
    }
}

/// Candidate relative paths for a package, deduplicated, in probe order
pub fn candidate_paths(short_name: &str) -> Vec<String> {
    let compact = short_name.replace('-', "");
    let derived = [
        format!("{short_name}.go"),
        format!("{compact}.go"),
        format!("cmd/{short_name}/main.go"),
        format!("internal/{compact}/service.go"),
    ];

    let mut bases: Vec<String> = Vec::new();
    for base in CONVENTIONAL_FILES
        .iter()
        .map(|s| s.to_string())
        .chain(derived)
    {
        if !bases.contains(&base) {
            bases.push(base);
        }
    }

    let mut candidates: Vec<String> = bases
        .iter()
        .flat_map(|base| TEMPLATE_SUFFIXES.iter().map(move |s| format!("{base}{s}")))
        .collect();
    candidates.extend(STATIC_FILES.iter().map(|s| s.to_string()));
    candidates
}
