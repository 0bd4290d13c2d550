//! PTX Factory - the building blocks shared by every publish process.
//!
//! This crate provides:
//!
//! - **Status tracking**: `ProcessStatus` and `StatusReport`
//! - **Registries**: JSON tables mapping `(category, name)` to compiled-in implementations
//! - **Builders**: `NodeBuilder`, a single-instance memoizing constructor
//!
//! # Example
//!
//! ```ignore
//! use ptx_factory::{ProcessStatus, Registry};
//!
//! let registry: Registry<MyKind> = Registry::load("processes.json")?;
//! let locator = registry.resolve("exporters", "abc")?;
//! let kind = registry.kind(&locator)?;
//!
//! let overall = ProcessStatus::aggregate([ProcessStatus::Succeeded, ProcessStatus::Warning]);
//! assert_eq!(overall, ProcessStatus::Warning);
//! ```

pub mod builder;
pub mod registry;
pub mod status;

// Re-export commonly used types
pub use builder::NodeBuilder;
pub use registry::{ImplementationLocator, Locator, Registry, RegistryError, RegistryResult};
pub use status::{Diagnostic, ProcessStatus, StatusError, StatusReport};
