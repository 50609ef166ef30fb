//! vmkit Path Model
//!
//! Typed addressing of locations inside a runtime view-model tree.
//!
//! # Core Concepts
//!
//! - [`VmId`]: Identity of one view-model instance in a tree
//! - [`PropertyKey`]: Identity of a declared property of a view-model type
//! - [`Path`]: Ordered sequence of [`Step`]s, always rooted at a view-model
//! - [`PathDefinition`]: Statically declared target, matched against runtime paths
//!
//! Paths are used to address validation requests and change events. The match
//! predicates on [`Path`] are exact-shape matches: no prefix or partial matching.
//!
//! # Example
//!
//! ```rust
//! use vmkit_path::{Path, PropertyKey, VmId};
//!
//! let owner = VmId::new(0);
//! let name = PropertyKey::new("Employee", "Name", 0);
//!
//! let path = Path::property(owner, name.clone());
//! assert_eq!(path.selects_only_property_of(owner), Some(&name));
//! assert!(!path.selects_ancestor());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod definition;
mod key;
mod path;

pub use definition::{DefinitionStep, PathDefinition, StepResolver, TargetKind};
pub use key::{PropertyKey, VmId};
pub use path::{Path, PathError, Step, StepKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
