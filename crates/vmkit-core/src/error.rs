//! Error types for vmkit core
//!
//! Two taxonomies exist:
//! - [`ConfigError`]: wiring defects of descriptors, chains and executors.
//!   They surface at the call site and are never retried.
//! - Domain validation failures, which are never errors here: they are
//!   accumulated as [`ValidationError`](crate::ValidationError)s inside a
//!   [`ValidationResult`](crate::ValidationResult).

use crate::behavior::Capability;
use crate::descriptor::PropertyKind;
use vmkit_path::{PathError, VmId};

/// Main vmkit error type
#[derive(Debug, thiserror::Error)]
pub enum ViewModelError {
    /// Configuration defect
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed path passed to a root-requiring operation
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// View-model id not present in the tree
    #[error("unknown view-model: {0}")]
    UnknownViewModel(VmId),

    /// Property not declared by the view-model's descriptor
    #[error("unknown property '{property}' on '{owner}'")]
    UnknownProperty {
        /// Descriptor name
        owner: String,
        /// Requested property
        property: String,
    },

    /// Value does not fit the property kind
    #[error("type mismatch on '{property}': expected {expected:?} value, found {found}")]
    TypeMismatch {
        /// Property being written
        property: String,
        /// Declared kind
        expected: PropertyKind,
        /// Kind of the offered value
        found: &'static str,
    },

    /// Write to a computed property
    #[error("property '{0}' is read-only")]
    ReadOnlyProperty(String),

    /// No behavior in the remaining chain implements the capability
    #[error("no behavior implements {capability:?} on '{subject}'")]
    MissingCapability {
        /// Requested capability
        capability: Capability,
        /// Chain subject
        subject: String,
    },

    /// Validator asked for a property value while targeting a view-model
    #[error("validator '{validator}' does not target a property")]
    NotAPropertyTarget {
        /// Validator name
        validator: String,
    },

    /// Assigning the child would make a view-model its own ancestor
    #[error("{child} cannot be placed below {parent}: it is an ancestor")]
    Cycle {
        /// View-model receiving the child
        parent: VmId,
        /// Offered child
        child: VmId,
    },

    /// Collection position out of range
    #[error("index {index} out of bounds for collection of length {len}")]
    IndexOutOfBounds {
        /// Requested position
        index: usize,
        /// Collection length
        len: usize,
    },

    /// No more view-model ids available
    #[error("view-model tree is full")]
    TreeFull,

    /// Configuration document could not be parsed
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] toml::de::Error),
}

impl ViewModelError {
    /// Check if error is a configuration defect
    #[inline]
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Path(_))
    }
}

/// Configuration errors: build-time wiring defects
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Property chain has no terminal value store, or a value accessor follows it
    #[error("chain for '{subject}' lacks a terminal value-storage behavior")]
    MissingTerminalStorage {
        /// Chain subject
        subject: String,
    },

    /// Behavior added after the chain handled its first call
    #[error("chain for '{subject}' is sealed")]
    ChainSealed {
        /// Chain subject
        subject: String,
    },

    /// Validator added after the executor validated its first request
    #[error("validator executor of '{view_model}' is sealed")]
    ExecutorSealed {
        /// Descriptor name
        view_model: String,
    },

    /// Second initialize handler for the same behavior type
    #[error("initialize handler for {behavior} already registered")]
    DuplicateInitializer {
        /// Behavior type name
        behavior: &'static str,
    },

    /// Property declared twice
    #[error("property '{property}' declared twice on '{owner}'")]
    DuplicateProperty {
        /// Descriptor name
        owner: String,
        /// Property name
        property: String,
    },

    /// Property key does not belong to the descriptor being built
    #[error("property '{property}' is not declared on '{owner}'")]
    ForeignProperty {
        /// Descriptor name
        owner: String,
        /// Property key rendered
        property: String,
    },

    /// Property-only behavior placed on a view-model chain
    #[error("behavior {behavior} requires a property chain")]
    PropertyChainRequired {
        /// Behavior name
        behavior: &'static str,
    },

    /// Behavior initialization rejected its context
    #[error("initialization of {behavior} failed: {reason}")]
    Initialization {
        /// Behavior name
        behavior: &'static str,
        /// Reason given by the behavior
        reason: String,
    },
}
