//! Behavior chains
//!
//! Every property of a view-model, and every view-model itself, is served by
//! an ordered [`BehaviorChain`]. A behavior advertises the capabilities it
//! implements; an operation entering the chain is handled by the first
//! behavior implementing the matching capability, which may continue to the
//! next implementor through its [`Next`] cursor or stop the operation.
//!
//! ```text
//! set_value ──► PropertyChange ──► DescendantsValidator ──► ParentLink ──► ValueStore
//!                    │ (ValueAccess)       │ (ValueAccess)      │             (terminal)
//!                    ▼
//!              notify_change
//! ```

mod chain;
mod context;
mod standard;

pub use chain::{BehaviorChain, BehaviorChainBuilder, ChainSubject, InitContext, InitHandlers, Next};
pub use context::{BehaviorContext, ReadContext};
pub use standard::{
    ComputedValueBehavior, DescriptorProviderBehavior, ParentLinkBehavior, PropertyChangeBehavior,
    UndoRecorderBehavior, ValidatedValueBehavior, ValueSource, ValueStoreBehavior,
};

use crate::descriptor::PropertyInfo;
use crate::error::{ConfigError, ViewModelError};
use crate::notify::ChangeArgs;
use crate::validation::{ValidationRequest, ValidationResult};
use crate::value::FieldValue;
use std::any::Any;
use std::fmt;

/// Upcast to [`Any`] for typed lookup of chain members
pub trait AsAny: Any {
    /// Borrow as [`Any`]
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Operation kinds a behavior may implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Get, set and validated-get of a value
    ValueAccess,
    /// Contribute to a validation result
    Validate,
    /// React to a change announcement
    HandleChange,
    /// Recompute or reload
    Refresh,
    /// Describe the property
    ProvideDescriptor,
    /// One-time setup when the chain is built
    Initialize,
}

impl Capability {
    /// Whether `behavior` implements this capability
    #[must_use]
    pub fn is_implemented_by(self, behavior: &dyn Behavior) -> bool {
        match self {
            Self::ValueAccess => behavior.value_access().is_some(),
            Self::Validate => behavior.validation().is_some(),
            Self::HandleChange => behavior.change_handler().is_some(),
            Self::Refresh => behavior.refresher().is_some(),
            Self::ProvideDescriptor => behavior.descriptor_provider().is_some(),
            Self::Initialize => behavior.initializer().is_some(),
        }
    }
}

/// Member of a [`BehaviorChain`]
///
/// Capabilities are advertised by returning `Some(self)` from the matching
/// query; the defaults advertise nothing.
pub trait Behavior: AsAny + fmt::Debug {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Value access capability
    fn value_access(&self) -> Option<&dyn ValueAccess> {
        None
    }

    /// Validation capability
    fn validation(&self) -> Option<&dyn Validate> {
        None
    }

    /// Change handling capability
    fn change_handler(&self) -> Option<&dyn HandleChange> {
        None
    }

    /// Refresh capability
    fn refresher(&self) -> Option<&dyn Refresh> {
        None
    }

    /// Descriptor capability
    fn descriptor_provider(&self) -> Option<&dyn ProvideDescriptor> {
        None
    }

    /// Initialization capability
    fn initializer(&self) -> Option<&dyn Initialize> {
        None
    }
}

/// Read and write a property value
pub trait ValueAccess {
    /// Current value
    ///
    /// # Errors
    /// Propagates errors of the remaining chain.
    fn get_value(&self, ctx: &ReadContext<'_>, next: Next<'_>) -> Result<FieldValue, ViewModelError>;

    /// Store a new value
    ///
    /// # Errors
    /// Propagates errors of the remaining chain.
    fn set_value(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError>;

    /// Value as last known valid
    ///
    /// # Errors
    /// Propagates errors of the remaining chain.
    fn get_validated_value(
        &self,
        ctx: &ReadContext<'_>,
        next: Next<'_>,
    ) -> Result<FieldValue, ViewModelError> {
        next.get_validated_value(ctx)
    }

    /// Whether this behavior owns the storage and never forwards value access
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Contribute to a validation result
pub trait Validate {
    /// Validate `request`, usually joining the own contribution with `next`
    ///
    /// # Errors
    /// Only configuration defects; rule violations go into the result.
    fn validate(
        &self,
        ctx: &ReadContext<'_>,
        next: Next<'_>,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, ViewModelError>;
}

/// React to a change announced at or below the chain's subject
pub trait HandleChange {
    /// Handle `args`; forwarding to `next` is up to the behavior
    ///
    /// # Errors
    /// Propagates errors of the remaining chain.
    fn handle_change(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        args: &ChangeArgs,
    ) -> Result<(), ViewModelError>;
}

/// Options of a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Also refresh properties declared as depending on the refreshed one
    pub execute_dependencies: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            execute_dependencies: true,
        }
    }
}

/// Recompute or reload a value
pub trait Refresh {
    /// Refresh, usually forwarding to `next`
    ///
    /// # Errors
    /// Propagates errors of the remaining chain.
    fn refresh(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        options: RefreshOptions,
    ) -> Result<(), ViewModelError>;
}

/// Describe the property served by the chain
pub trait ProvideDescriptor {
    /// Property description, available once the chain is built
    fn property_info(&self) -> Option<PropertyInfo>;
}

/// One-time setup
pub trait Initialize {
    /// Called once while the chain is built, in chain order
    ///
    /// # Errors
    /// Returns a configuration error when the context is unsuitable.
    fn initialize(&self, init: &InitContext) -> Result<(), ConfigError>;
}
