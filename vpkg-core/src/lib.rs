//! vpkg library exports

pub mod config;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod installer;
pub mod registry;
pub mod render;
pub mod store;
pub mod uninstall;
pub mod updates;

pub use config::{Settings, SettingsOverrides};
pub use error::{ErrorKind, Result, VpkgError};
pub use installer::{InstallOptions, InstallOutcome, Installer};
pub use registry::{PackageResolver, RegistryClient};
pub use store::InstalledIndex;
pub use uninstall::Uninstaller;
