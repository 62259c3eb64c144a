//! Package registry access
//!
//! # Architecture
//!
//! ```text
//! registry.yaml            ← lists repositories (never packages)
//!     │
//!     ├── repo A meta.yaml ← lists packages hosted in repo A
//!     └── repo B meta.yaml
//!            │
//!            ▼
//!     PackageResolver      ← first declared match wins
//!            │
//!            ▼
//!     {base}/{templates}/… ← template files, fetched individually
//! ```

mod client;
mod index;
mod manifest;
mod resolver;
mod specifier;

pub use client::{join_url, RegistryClient};
pub use index::{RegistryIndex, RepositoryRef, Tag};
pub use manifest::{
    PackageDescriptor, PackageFilter, PackageKind, RepositoryManifest, SyncSpec, TemplatesField,
    DEFAULT_ENTRY, SYNC_CAPABILITY,
};
pub use resolver::{AvailablePackage, PackageResolver, ResolvedPackage};
pub use specifier::PackageSpec;
