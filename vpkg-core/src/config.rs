//! vpkg settings
//!
//! ## Sources (in precedence order)
//!
//! 1. Explicit overrides from the caller (CLI flags)
//! 2. Environment: `VPKG_REGISTRY_URL`, `VPKG_INSTALL_ROOT`, `VPKG_CONTENTS_API_URL`
//! 3. `.vpkg/config.yaml` in the project root
//! 4. `config.yaml` in the user config directory
//! 5. Built-in defaults
//!
//! Settings are built once per command invocation and passed down
//! explicitly; nothing in the crate reads them from global state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, VpkgError};

/// Default registry index URL
pub const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/alfariiizi/vpkg-registry/main/registry.yaml";

/// Default install root, relative to the project root
pub const DEFAULT_INSTALL_ROOT: &str = "vpkg";

/// Name of the per-install metadata file
pub const DEFAULT_METADATA_FILE: &str = "meta.yaml";

/// Default directory-listing API (GitHub contents API)
pub const DEFAULT_CONTENTS_API_URL: &str = "https://api.github.com";

/// Environment variable forcing the interactive progress UI
pub const FORCE_TUI_ENV: &str = "VPKG_FORCE_TUI";

const PROJECT_CONFIG_FILE: &str = ".vpkg/config.yaml";

/// Resolved settings for one invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// URL of the registry index document
    pub registry_url: String,

    /// Directory (relative to the project root) holding installed packages
    pub install_root: PathBuf,

    /// File name of the per-install metadata record
    pub metadata_file: String,

    /// Timeout for index, manifest and file fetches
    pub content_timeout_secs: u64,

    /// Timeout for existence probes during heuristic discovery
    pub probe_timeout_secs: u64,

    /// Base URL of the directory-listing API
    pub contents_api_url: String,

    /// Branch used when listing repository contents
    pub default_branch: String,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            install_root: PathBuf::from(DEFAULT_INSTALL_ROOT),
            metadata_file: DEFAULT_METADATA_FILE.to_string(),
            content_timeout_secs: 30,
            probe_timeout_secs: 5,
            contents_api_url: DEFAULT_CONTENTS_API_URL.to_string(),
            default_branch: "main".to_string(),
            user_agent: concat!("vpkg/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Explicit caller overrides (highest precedence)
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub registry_url: Option<String>,
    pub install_root: Option<PathBuf>,
}

/// Partial settings as found in a config file
#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsFile {
    registry_url: Option<String>,
    install_root: Option<PathBuf>,
    metadata_file: Option<String>,
    content_timeout_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
    contents_api_url: Option<String>,
    default_branch: Option<String>,
    user_agent: Option<String>,
}

impl Settings {
    /// Load settings for a project, applying every source in precedence order
    pub fn load(project_root: &Path, overrides: &SettingsOverrides) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(user_file) = Self::user_config_path() {
            settings.apply_file(&user_file)?;
        }
        settings.apply_file(&project_root.join(PROJECT_CONFIG_FILE))?;
        settings.apply_env(|key| std::env::var(key).ok());
        settings.apply_overrides(overrides);

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a single file on top of defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut settings = Settings::default();
        settings.apply_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// User-level config file location, if a config directory can be determined
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "vandor", "vpkg")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path).map_err(|e| VpkgError::io(path, e))?;
        let file: SettingsFile = serde_yaml_ng::from_str(&content).map_err(|e| {
            VpkgError::Config(format!("Failed to parse {}: {e}", path.display()))
        })?;

        tracing::debug!("Applying settings from {}", path.display());

        if let Some(v) = file.registry_url {
            self.registry_url = v;
        }
        if let Some(v) = file.install_root {
            self.install_root = v;
        }
        if let Some(v) = file.metadata_file {
            self.metadata_file = v;
        }
        if let Some(v) = file.content_timeout_secs {
            self.content_timeout_secs = v;
        }
        if let Some(v) = file.probe_timeout_secs {
            self.probe_timeout_secs = v;
        }
        if let Some(v) = file.contents_api_url {
            self.contents_api_url = v;
        }
        if let Some(v) = file.default_branch {
            self.default_branch = v;
        }
        if let Some(v) = file.user_agent {
            self.user_agent = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("VPKG_REGISTRY_URL").filter(|v| !v.is_empty()) {
            self.registry_url = v;
        }
        if let Some(v) = lookup("VPKG_INSTALL_ROOT").filter(|v| !v.is_empty()) {
            self.install_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("VPKG_CONTENTS_API_URL").filter(|v| !v.is_empty()) {
            self.contents_api_url = v;
        }
    }

    fn apply_overrides(&mut self, overrides: &SettingsOverrides) {
        if let Some(v) = &overrides.registry_url {
            self.registry_url = v.clone();
        }
        if let Some(v) = &overrides.install_root {
            self.install_root = v.clone();
        }
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if !self.registry_url.starts_with("http://") && !self.registry_url.starts_with("https://")
        {
            return Err(VpkgError::Config(format!(
                "Registry URL must start with http:// or https:// (got '{}')",
                self.registry_url
            )));
        }

        if self.install_root.is_absolute()
            || self
                .install_root
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(VpkgError::Config(format!(
                "Install root must be a relative path inside the project (got '{}')",
                self.install_root.display()
            )));
        }

        if self.metadata_file.is_empty() || self.metadata_file.contains(['/', '\\']) {
            return Err(VpkgError::Config(format!(
                "Metadata file must be a plain file name (got '{}')",
                self.metadata_file
            )));
        }

        if self.content_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(VpkgError::Config("Timeouts must be greater than zero".to_string()));
        }

        Ok(())
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Save settings as a project config file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)
            .map_err(|e| VpkgError::Config(format!("Failed to serialize settings: {e}")))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VpkgError::io(parent, e))?;
        }

        std::fs::write(path, content).map_err(|e| VpkgError::io(path, e))?;
        Ok(())
    }
}

/// Whether the interactive progress UI should be used
///
/// `VPKG_FORCE_TUI` turns it on regardless of the terminal.
pub fn interactive_progress_enabled(stdout_is_terminal: bool) -> bool {
    std::env::var(FORCE_TUI_ENV)
        .map(|v| !v.is_empty())
        .unwrap_or(false)
        || stdout_is_terminal
}
