//! Running package-provided programs
//!
//! Sync hooks and `exec` entry points share one contract: an entry path
//! inside the installed package directory, an optional interpreter, and
//! arguments. Each run is a supervised child process whose result comes
//! back as a [`HookOutcome`].

mod exec;
mod sync;

pub use exec::exec;
pub use sync::{SyncCapabilityRunner, SyncFailure, SyncReport};

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::error::{Result, VpkgError};
use crate::store::InstalledPackage;

/// Where a child's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Stream to the parent's stdout/stderr
    #[default]
    Inherit,
    Capture,
}

/// A fully described child process
#[derive(Debug, Clone)]
pub struct Invocation {
    pub package: String,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub output: OutputMode,
}

/// Structured result of one run
#[derive(Debug, Clone, PartialEq)]
pub struct HookOutcome {
    pub package: String,
    /// `None` when the child was killed by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    pub duration: Duration,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl Invocation {
    /// Build the invocation for `entry` inside an installed package
    ///
    /// With an explicit `interpreter` (split shell-style) the entry becomes
    /// its argument. Otherwise `.go` entries run through `go run`, `.sh`
    /// entries through `sh`, and anything else is executed directly.
    pub fn for_entry(
        installed: &InstalledPackage,
        project_root: &Path,
        entry: &str,
        interpreter: Option<&str>,
        args: &[String],
    ) -> Result<Self> {
        let package = installed.name().to_string();

        let relative = Path::new(entry);
        if entry.trim().is_empty()
            || relative.is_absolute()
            || relative.components().any(|c| matches!(c, Component::ParentDir))
        {
            return Err(VpkgError::capability(
                &package,
                format!("entry '{entry}' must be a path inside the package"),
            ));
        }

        let entry_path = installed.dir.join(relative);
        if !entry_path.is_file() {
            return Err(VpkgError::capability(
                &package,
                format!("entry not found: {}", entry_path.display()),
            ));
        }
        let entry_arg = entry_path.to_string_lossy().into_owned();

        let mut command: Vec<String> = match interpreter.filter(|i| !i.trim().is_empty()) {
            Some(interpreter) => {
                let mut words = shell_words::split(interpreter).map_err(|e| {
                    VpkgError::capability(&package, format!("invalid interpreter '{interpreter}': {e}"))
                })?;
                words.push(entry_arg);
                words
            }
            None => match entry_path.extension().and_then(|e| e.to_str()) {
                Some("go") => vec!["go".to_string(), "run".to_string(), entry_arg],
                Some("sh") => vec!["sh".to_string(), entry_arg],
                _ => vec![entry_arg],
            },
        };
        command.extend(args.iter().cloned());

        let program = command.remove(0);
        Ok(Self {
            env: vec![
                (
                    "VPKG_PROJECT_ROOT".to_string(),
                    project_root.to_string_lossy().into_owned(),
                ),
                ("VPKG_PACKAGE".to_string(), package.clone()),
                (
                    "VPKG_PACKAGE_DIR".to_string(),
                    installed.dir.to_string_lossy().into_owned(),
                ),
            ],
            package,
            program,
            args: command,
            working_dir: project_root.to_path_buf(),
            timeout: None,
            output: OutputMode::Inherit,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Run the child to completion
    ///
    /// A non-zero exit is reported in the outcome; spawn failures and
    /// timeouts are `Capability` errors.
    pub async fn run(&self) -> Result<HookOutcome> {
        tracing::debug!(
            "Running {} {:?} for {} in {}",
            self.program,
            self.args,
            self.package,
            self.working_dir.display()
        );

        let (stdout, stderr) = match self.output {
            OutputMode::Inherit => (Stdio::inherit(), Stdio::inherit()),
            OutputMode::Capture => (Stdio::piped(), Stdio::piped()),
        };

        let started = Instant::now();
        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                VpkgError::capability(&self.package, format!("failed to start {}: {e}", self.program))
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    VpkgError::capability(&self.package, format!("timed out after {}s", limit.as_secs()))
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| VpkgError::capability(&self.package, format!("failed to wait: {e}")))?;

        let captured = |bytes: &[u8]| match self.output {
            OutputMode::Capture => Some(String::from_utf8_lossy(bytes).into_owned()),
            OutputMode::Inherit => None,
        };

        Ok(HookOutcome {
            package: self.package.clone(),
            exit_code: output.status.code(),
            success: output.status.success(),
            duration: started.elapsed(),
            stdout: captured(&output.stdout),
            stderr: captured(&output.stderr),
        })
    }
}

impl HookOutcome {
    /// `Capability` error unless the run succeeded
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let status = match self.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        };
        let detail = self
            .stderr
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!(": {s}"))
            .unwrap_or_default();
        Err(VpkgError::capability(&self.package, format!("{status}{detail}")))
    }
}
