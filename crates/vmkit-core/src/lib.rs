//! vmkit Core - behavior chains for view-model trees
//!
//! The engine that:
//! - Serves every property through an ordered, sealable behavior chain
//! - Routes validation requests from a view-model up to every ancestor
//! - Recomputes validation results after each mutation
//! - Announces exactly one notification per observable change
//!
//! # Example
//!
//! ```rust
//! use vmkit_core::{Notification, RequiredValidator, ViewModelTree, VmDescriptor};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! # fn main() -> Result<(), vmkit_core::ViewModelError> {
//! let mut employee = VmDescriptor::builder("EmployeeVM");
//! let name = employee.property("Name")?;
//! employee.validate_property(&name, RequiredValidator::new("name is required"))?;
//! let employee = employee.build()?;
//!
//! let mut tree = ViewModelTree::new();
//! let vm = tree.create(&employee)?;
//! assert!(!tree.is_valid(vm)?);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! tree.subscribe(vm, move |n| sink.borrow_mut().push(n.clone()))?;
//!
//! tree.set_value(vm, &name, "Ada")?;
//! assert!(tree.is_valid(vm)?);
//! assert!(seen
//!     .borrow()
//!     .contains(&Notification::ValidityChanged { vm, is_valid: true }));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod behavior;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod notify;
pub mod tree;
pub mod validation;
pub mod value;

// Re-exports for convenience
pub use behavior::{
    Behavior, BehaviorChain, BehaviorChainBuilder, BehaviorContext, Capability, ChainSubject,
    InitContext, InitHandlers, Next, ReadContext, RefreshOptions,
};
pub use config::{RevalidationExtent, TreeConfig};
pub use descriptor::{
    Dependency, PropertyDescriptor, PropertyInfo, PropertyKind, VmDescriptor, VmDescriptorBuilder,
};
pub use error::{ConfigError, ViewModelError};
pub use notify::{ChangeArgs, ChangeType, Notification, SubscriptionId, ViewModelNotifierBehavior};
pub use tree::ViewModelTree;
pub use validation::{
    CompositeValidator, ErrorTarget, FnValidator, MaxLengthValidator, RequiredValidator,
    ValidationArgs, ValidationError, ValidationRequest, ValidationResult, ValidationScope,
    Validator, ValidatorExecutorBehavior,
};
pub use value::FieldValue;
pub use vmkit_path::{Path, PathDefinition, PathError, PropertyKey, Step, TargetKind, VmId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for declaring and driving view-models
    pub use crate::{
        FieldValue, Notification, PathDefinition, PropertyKey, RequiredValidator,
        ValidationScope, ViewModelError, ViewModelTree, VmDescriptor, VmId,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
