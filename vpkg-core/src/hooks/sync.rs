//! Sync hooks across all installed packages

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::{HookOutcome, Invocation, OutputMode};
use crate::config::Settings;
use crate::error::{Result, VpkgError};
use crate::registry::SyncSpec;
use crate::store::{InstalledIndex, InstalledPackage};

/// Every hook ran successfully
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub outcomes: Vec<HookOutcome>,
}

/// The first failing hook, plus the ones that completed before it
#[derive(Debug)]
pub struct SyncFailure {
    pub completed: Vec<HookOutcome>,
    pub package: String,
    pub error: VpkgError,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync stopped at {}: {}", self.package, self.error)
    }
}

impl std::error::Error for SyncFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<SyncFailure> for VpkgError {
    fn from(failure: SyncFailure) -> Self {
        failure.error
    }
}

pub struct SyncCapabilityRunner {
    project_root: PathBuf,
    settings: Settings,
    output: OutputMode,
}

impl SyncCapabilityRunner {
    pub fn new(project_root: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            project_root: project_root.into(),
            settings: settings.clone(),
            output: OutputMode::Inherit,
        }
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Run every hook in order, stopping at the first failure
    pub async fn run_all(&self) -> std::result::Result<SyncReport, SyncFailure> {
        let index = self.index().map_err(|error| SyncFailure {
            completed: Vec::new(),
            package: String::new(),
            error,
        })?;

        let mut completed = Vec::new();
        for installed in index.with_sync_hooks() {
            let Some(hook) = installed.sync_hook() else {
                continue;
            };
            let package = installed.name().to_string();
            tracing::info!("Syncing {}", package);

            match self.run_hook(installed, hook).await {
                Ok(outcome) => completed.push(outcome),
                Err(error) => {
                    tracing::warn!("Sync hook for {} failed: {}", package, error);
                    return Err(SyncFailure {
                        completed,
                        package,
                        error,
                    });
                }
            }
        }

        Ok(SyncReport {
            outcomes: completed,
        })
    }

    async fn run_hook(&self, installed: &InstalledPackage, hook: &SyncSpec) -> Result<HookOutcome> {
        Invocation::for_entry(
            installed,
            &self.project_root,
            &hook.provider,
            hook.interpreter.as_deref(),
            &hook.args,
        )?
        .with_timeout(hook.timeout_seconds.map(Duration::from_secs))
        .with_output(self.output)
        .run()
        .await?
        .into_result()
    }

    fn index(&self) -> Result<InstalledIndex> {
        InstalledIndex::scan(
            &self.project_root.join(&self.settings.install_root),
            &self.settings.metadata_file,
        )
    }
}
