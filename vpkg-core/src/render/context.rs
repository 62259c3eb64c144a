//! Values substituted into template files

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;

use super::funcs::to_go_identifier;
use crate::registry::ResolvedPackage;

/// Per-install template variables
///
/// Built once per install and shared unchanged by every file. Every
/// identifier field is derived from the package specifier alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RenderContext {
    /// Module path of the consuming project (from go.mod)
    pub module: String,
    /// `namespace/short-name`
    pub vpkg_name: String,
    pub namespace: String,
    /// Short name as written, e.g. `redis-cache`
    pub pkg: String,
    /// Sanitized identifier, e.g. `rediscache`
    pub package: String,
    /// Destination relative to the project root, `/`-separated
    pub package_path: String,
    pub version: String,
    pub author: String,
    /// RFC 3339 install timestamp
    pub time: String,
    pub title: String,
    pub description: String,
}

/// Variable names visible to templates
pub const VARIABLES: &[&str] = &[
    "Module",
    "VpkgName",
    "Namespace",
    "Pkg",
    "Package",
    "PackagePath",
    "Version",
    "Author",
    "Time",
    "Title",
    "Description",
];

impl RenderContext {
    pub fn new(
        resolved: &ResolvedPackage,
        module: &str,
        package_path: &Path,
        version: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let descriptor = &resolved.descriptor;
        let author = descriptor
            .author
            .clone()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| resolved.repository.author.clone());

        Self {
            module: module.to_string(),
            vpkg_name: resolved.spec.name(),
            namespace: resolved.spec.namespace.clone(),
            pkg: resolved.spec.short_name.clone(),
            package: sanitized_identifier(&resolved.spec.short_name),
            package_path: slash_path(package_path),
            version: version.to_string(),
            author,
            time: timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            title: descriptor.title.clone(),
            description: descriptor.description.clone(),
        }
    }

    /// Look up a template variable by name
    pub fn variable(&self, name: &str) -> Option<&str> {
        let value = match name {
            "Module" => &self.module,
            "VpkgName" => &self.vpkg_name,
            "Namespace" => &self.namespace,
            "Pkg" => &self.pkg,
            "Package" => &self.package,
            "PackagePath" => &self.package_path,
            "Version" => &self.version,
            "Author" => &self.author,
            "Time" => &self.time,
            "Title" => &self.title,
            "Description" => &self.description,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Go identifier for a short name: hyphens dropped, then sanitized
pub fn sanitized_identifier(short_name: &str) -> String {
    to_go_identifier(&short_name.replace('-', ""))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Module path declared in `go.mod` under `project_root`
///
/// Falls back to the project directory name when there is no readable
/// `module` line.
pub fn detect_module(project_root: &Path) -> String {
    let go_mod = project_root.join("go.mod");
    match std::fs::read_to_string(&go_mod) {
        Ok(content) => {
            if let Some(module) = parse_module_line(&content) {
                return module;
            }
            tracing::warn!("No module directive in {}", go_mod.display());
        }
        Err(e) => tracing::warn!("Could not read {}: {}", go_mod.display(), e),
    }

    project_root
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string())
}

fn parse_module_line(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let module = rest.split("//").next()?.trim().trim_matches('"');
        (!module.is_empty()).then(|| module.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PackageSpec, RepositoryRef};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn resolved(spec: &str) -> ResolvedPackage {
        ResolvedPackage {
            spec: PackageSpec::parse(spec).unwrap(),
            repository: RepositoryRef {
                name: "official".to_string(),
                repository_url: String::new(),
                manifest_url: "https://example.com/meta.yaml".to_string(),
                author: "acme".to_string(),
                verified: true,
            },
            descriptor: serde_yaml_ng::from_str(
                "name: acme/redis-cache\ntitle: Redis cache\ndescription: Cache\ntype: fx-module\ntemplates: t\nversion: 1.0.0\n",
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_identifiers_are_derived_from_specifier() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let ctx = RenderContext::new(
            &resolved("acme/redis-cache"),
            "example.com/app",
            &PathBuf::from("vpkg").join("acme").join("redis-cache"),
            "1.0.0",
            ts,
        );

        assert_eq!(ctx.vpkg_name, "acme/redis-cache");
        assert_eq!(ctx.namespace, "acme");
        assert_eq!(ctx.pkg, "redis-cache");
        assert_eq!(ctx.package, "rediscache");
        assert_eq!(ctx.package_path, "vpkg/acme/redis-cache");
        assert_eq!(ctx.author, "acme");
        assert_eq!(ctx.time, "2024-05-01T12:00:00Z");
        assert_eq!(ctx.variable("PackagePath"), Some("vpkg/acme/redis-cache"));
        assert_eq!(ctx.variable("Nope"), None);
    }

    #[test]
    fn test_same_specifier_same_context() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let path = PathBuf::from("vpkg/acme/redis-cache");
        let a = RenderContext::new(&resolved("acme/redis-cache"), "m", &path, "1", ts);
        let b = RenderContext::new(&resolved("acme/redis-cache"), "m", &path, "1", ts);
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_variable_resolves() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let ctx = RenderContext::new(&resolved("acme/redis-cache"), "m", Path::new("p"), "1", ts);
        for name in VARIABLES {
            assert!(ctx.variable(name).is_some(), "{name}");
        }
    }

    #[test]
    fn test_parse_module_line() {
        let go_mod = "// comment\nmodule github.com/acme/app // trailing\n\ngo 1.22\n";
        assert_eq!(
            parse_module_line(go_mod).as_deref(),
            Some("github.com/acme/app")
        );
        assert_eq!(parse_module_line("modules x\n"), None);
    }

    #[test]
    fn test_detect_module_reads_go_mod() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("go.mod"), "module example.com/shop\n").unwrap();
        assert_eq!(detect_module(temp_dir.path()), "example.com/shop");
    }
}
