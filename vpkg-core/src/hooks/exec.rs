//! Running an installed cli-command package

use std::path::Path;

use super::{HookOutcome, Invocation};
use crate::config::Settings;
use crate::error::{Result, VpkgError};
use crate::registry::{PackageKind, PackageSpec};
use crate::store::InstalledIndex;

/// Run the entry point of installed package `name` with `args`
///
/// Output is streamed. The child's exit status is returned in the
/// outcome rather than as an error so the caller can pass it through.
pub async fn exec(
    project_root: &Path,
    settings: &Settings,
    name: &str,
    args: &[String],
) -> Result<HookOutcome> {
    let spec = PackageSpec::parse(name)?;
    let install_root = project_root.join(&settings.install_root);
    let index = InstalledIndex::scan(&install_root, &settings.metadata_file)?;

    let installed = index
        .get(&spec.name())
        .ok_or_else(|| VpkgError::NotInstalled {
            name: spec.name(),
            path: install_root.join(&spec.namespace).join(&spec.short_name),
        })?;

    if installed.record.kind != PackageKind::CliCommand {
        return Err(VpkgError::capability(
            installed.name(),
            format!("is a {}, not a cli-command", installed.record.kind),
        ));
    }

    let entry = installed.record.meta.entry();
    tracing::info!("Executing {} ({})", installed.name(), entry);

    Invocation::for_entry(installed, project_root, entry, None, args)?
        .run()
        .await
}
