//! Error types for vpkg operations
//!
//! Every failure an operation can report maps onto one [`ErrorKind`], so
//! callers can branch on the kind and still print a message that names the
//! URL, path or package involved.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`VpkgError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Schema,
    NotFound,
    NoTemplates,
    AlreadyExists,
    Render,
    Io,
    Config,
    InvalidSpecifier,
    Capability,
    Cancelled,
}

#[derive(Error, Debug)]
pub enum VpkgError {
    /// Registry, repository or file unreachable
    #[error("Failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },

    /// Remote answered with a non-2xx status
    #[error("Request to {url} failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// A fetched document did not parse into the expected structure
    #[error("Malformed document at {url}: {reason}")]
    Schema { url: String, reason: String },

    #[error("Package '{0}' not found in any repository")]
    PackageNotFound(String),

    #[error("File not found: {url}")]
    FileNotFound { url: String },

    #[error("Package '{name}' is not installed (looked in {path})")]
    NotInstalled { name: String, path: PathBuf },

    #[error("No template files found for '{package}' under '{root}'")]
    NoTemplates { package: String, root: String },

    #[error("Destination {path} already contains files (use --force to overwrite)")]
    AlreadyExists { path: PathBuf },

    #[error("Failed to render {file}: {reason}")]
    Render { file: String, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid package specifier '{spec}': {reason}")]
    InvalidSpecifier { spec: String, reason: String },

    /// A sync hook or exec entry point failed
    #[error("Package '{package}' failed: {reason}")]
    Capability { package: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, VpkgError>;

impl VpkgError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VpkgError::Network { .. } | VpkgError::HttpStatus { .. } => ErrorKind::Network,
            VpkgError::Schema { .. } => ErrorKind::Schema,
            VpkgError::PackageNotFound(_)
            | VpkgError::FileNotFound { .. }
            | VpkgError::NotInstalled { .. } => ErrorKind::NotFound,
            VpkgError::NoTemplates { .. } => ErrorKind::NoTemplates,
            VpkgError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            VpkgError::Render { .. } => ErrorKind::Render,
            VpkgError::Io { .. } => ErrorKind::Io,
            VpkgError::Config(_) => ErrorKind::Config,
            VpkgError::InvalidSpecifier { .. } => ErrorKind::InvalidSpecifier,
            VpkgError::Capability { .. } => ErrorKind::Capability,
            VpkgError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Attach a path to an `std::io::Error`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VpkgError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn network(url: &str, reason: impl std::fmt::Display) -> Self {
        VpkgError::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn schema(url: &str, reason: impl std::fmt::Display) -> Self {
        VpkgError::Schema {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn capability(package: &str, reason: impl std::fmt::Display) -> Self {
        VpkgError::Capability {
            package: package.to_string(),
            reason: reason.to_string(),
        }
    }
}
