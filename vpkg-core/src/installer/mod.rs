//! Package installation
//!
//! Resolves a specifier, discovers the package's files, renders them into a
//! staging directory and moves them into the destination together with the
//! install record.
//!
//! A fetch or render failure leaves the destination exactly as it was: the
//! stage is dropped and nothing is committed.

mod progress;
mod receipt;
mod staging;

pub use progress::{
    spawn_install, FileCounter, InstallHandle, InstallStep, Progress, ProgressEvent,
};
pub use receipt::usage_text;
pub use staging::STAGING_PREFIX;

use chrono::Utc;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

use crate::discovery::{output_path, template_suffix, TemplateDiscovery};
use crate::error::{Result, VpkgError};
use crate::registry::{join_url, PackageKind, PackageResolver, RegistryClient, ResolvedPackage};
use crate::render::{detect_module, render_file, RenderContext};
use crate::store::InstalledPackageRecord;
use staging::Stage;

/// Caller-selected install options
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Install here instead of the descriptor hint or default location
    pub destination: Option<PathBuf>,
    /// Overwrite a populated destination
    pub force: bool,
    /// Report what would happen without touching the filesystem
    pub dry_run: bool,
    /// Version to record; a `@version` suffix on the specifier wins
    pub version: Option<String>,
}

/// One installed file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstalledFile {
    /// Path relative to the destination
    pub path: String,
    /// Rendered from a template (otherwise copied verbatim)
    pub rendered: bool,
}

/// Result of a completed install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub kind: PackageKind,
    pub repository: String,
    pub destination: PathBuf,
    pub files: Vec<InstalledFile>,
    pub record_path: PathBuf,
    /// Discovery strategy that produced the file list
    pub discovered_by: String,
    /// Wiring instructions for the consuming project
    pub usage: String,
}

/// What a dry run would do
#[derive(Debug, Clone, Serialize)]
pub struct InstallPlan {
    pub name: String,
    pub version: String,
    pub kind: PackageKind,
    pub repository: String,
    pub destination: PathBuf,
    pub record_path: PathBuf,
    /// Destination already holds files (install would need `force`)
    pub overwrites: bool,
    pub context: RenderContext,
}

#[derive(Debug, Clone)]
pub enum InstallOutcome {
    Installed(InstallReceipt),
    DryRun(InstallPlan),
}

/// Installer bound to one project and one registry client
#[derive(Debug, Clone)]
pub struct Installer {
    client: RegistryClient,
    project_root: PathBuf,
}

impl Installer {
    pub fn new(client: RegistryClient, project_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Install a package without progress reporting
    pub async fn install(&self, specifier: &str, options: &InstallOptions) -> Result<InstallOutcome> {
        self.install_with_progress(specifier, options, &Progress::silent())
            .await
    }

    /// Install a package, reporting each step to `progress`
    pub async fn install_with_progress(
        &self,
        specifier: &str,
        options: &InstallOptions,
        progress: &Progress,
    ) -> Result<InstallOutcome> {
        let mut step = InstallStep::Discovery;
        let result = self.run(specifier, options, progress, &mut step).await;
        match &result {
            Ok(_) => progress.report(InstallStep::Install, 1.0, "Installed"),
            Err(e) => progress.fail(step, e),
        }
        result
    }

    async fn run(
        &self,
        specifier: &str,
        options: &InstallOptions,
        progress: &Progress,
        step: &mut InstallStep,
    ) -> Result<InstallOutcome> {
        let settings = self.client.settings();

        progress.report(InstallStep::Discovery, 0.0, format!("Resolving {specifier}"));
        let resolved = PackageResolver::new(&self.client).resolve(specifier).await?;
        progress.checkpoint()?;

        let relative_dest = self.destination_for(&resolved, options)?;
        let destination = self.project_root.join(&relative_dest);
        let record_path = destination.join(&settings.metadata_file);
        let occupied = is_populated(&destination);

        if occupied && !options.force {
            return Err(VpkgError::AlreadyExists { path: destination });
        }

        let version = resolved.effective_version(options.version.as_deref());
        let module = detect_module(&self.project_root);
        let context = RenderContext::new(&resolved, &module, &relative_dest, &version, Utc::now());

        if options.dry_run {
            tracing::info!("Dry run: {} would install to {}", resolved.spec.name(), destination.display());
            return Ok(InstallOutcome::DryRun(InstallPlan {
                name: resolved.spec.name(),
                version,
                kind: resolved.descriptor.kind,
                repository: resolved.repository.name.clone(),
                destination,
                record_path,
                overwrites: occupied,
                context,
            }));
        }

        progress.report(InstallStep::Discovery, 0.5, "Discovering template files");
        let discovered = TemplateDiscovery::new(&self.client)
            .discover(&resolved.repository, &resolved.descriptor)
            .await?;
        progress.report(
            InstallStep::Discovery,
            1.0,
            format!("Found {} file(s) via {}", discovered.files.len(), discovered.strategy),
        );
        if let Some(file) = discovered
            .files
            .iter()
            .find(|f| output_path(f) == settings.metadata_file)
        {
            return Err(VpkgError::schema(
                &resolved.repository.manifest_url,
                format!(
                    "{} ships {file}, which would replace its install record {}",
                    resolved.descriptor.name, settings.metadata_file
                ),
            ));
        }
        progress.checkpoint()?;

        let stage = Stage::next_to(&destination)?;
        tracing::debug!("Staging {} in {}", resolved.spec.name(), stage.path().display());
        let files_root = join_url(
            resolved.repository.base_url(),
            resolved.descriptor.templates_root(),
        );
        let total = discovered.files.len();
        let mut installed = Vec::with_capacity(total);

        for (i, file) in discovered.files.iter().enumerate() {
            progress.checkpoint()?;

            *step = InstallStep::Download;
            progress.files(InstallStep::Download, i, total, format!("Fetching {file}"));
            let bytes = self.client.fetch_file(&files_root, file).await?;

            *step = InstallStep::Render;
            let rendered = template_suffix(file).is_some();
            let output = render_file(file, bytes, &context)?;
            let target = output_path(file);
            stage.write(target, &output)?;
            progress.files(InstallStep::Render, i + 1, total, format!("Wrote {target}"));

            installed.push(InstalledFile {
                path: target.to_string(),
                rendered,
            });
        }
        progress.report(InstallStep::Download, 1.0, "All files fetched");

        let record = InstalledPackageRecord {
            name: resolved.spec.name(),
            version: version.clone(),
            installed_at: Utc::now(),
            path: context.package_path.clone(),
            kind: resolved.descriptor.kind,
            meta: resolved.descriptor.clone(),
        };
        stage.write(&settings.metadata_file, record.to_yaml()?.as_bytes())?;
        progress.checkpoint()?;

        *step = InstallStep::Install;
        progress.report(InstallStep::Install, 0.0, format!("Installing to {}", relative_dest.display()));
        stage.commit(&destination)?;

        tracing::info!(
            "Installed {} {} to {}",
            record.name,
            record.version,
            destination.display()
        );

        Ok(InstallOutcome::Installed(InstallReceipt {
            name: record.name,
            version,
            kind: resolved.descriptor.kind,
            repository: resolved.repository.name.clone(),
            destination,
            files: installed,
            record_path,
            discovered_by: discovered.strategy.to_string(),
            usage: usage_text(&resolved.descriptor, &context),
        }))
    }

    /// Destination relative to the project root
    ///
    /// Explicit option, then descriptor hint, then `{install_root}/{namespace}/{name}`.
    /// Every choice lands below the install root so the install stays visible
    /// to the store: hints are taken relative to it and an explicit path
    /// outside it is refused.
    fn destination_for(&self, resolved: &ResolvedPackage, options: &InstallOptions) -> Result<PathBuf> {
        let settings = self.client.settings();

        if let Some(dest) = &options.destination {
            let install_root = self.project_root.join(&settings.install_root);
            let full = self.project_root.join(dest);
            if has_parent_component(dest) || !full.starts_with(&install_root) || full == install_root {
                return Err(VpkgError::Config(format!(
                    "destination '{}' must be a directory under the install root '{}'",
                    dest.display(),
                    settings.install_root.display()
                )));
            }
            return Ok(match full.strip_prefix(&self.project_root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => full,
            });
        }

        if let Some(hint) = resolved.descriptor.destination_hint.as_deref().filter(|h| !h.is_empty()) {
            let hint = PathBuf::from(hint);
            if hint.is_absolute() || has_parent_component(&hint) {
                return Err(VpkgError::schema(
                    &resolved.repository.manifest_url,
                    format!(
                        "destination '{}' of {} leaves the install root",
                        hint.display(),
                        resolved.descriptor.name
                    ),
                ));
            }
            if hint.starts_with(&settings.install_root) && hint != settings.install_root {
                return Ok(hint);
            }
            return Ok(settings.install_root.join(hint));
        }

        Ok(settings
            .install_root
            .join(&resolved.spec.namespace)
            .join(&resolved.spec.short_name))
    }
}

fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

/// A file, or a directory with at least one entry
fn is_populated(path: &Path) -> bool {
    if path.is_file() {
        return true;
    }
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
