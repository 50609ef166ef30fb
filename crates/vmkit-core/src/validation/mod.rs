//! Validation engine
//!
//! Validators are declared on a view-model type against a
//! [`PathDefinition`](vmkit_path::PathDefinition) and run by that type's
//! [`ValidatorExecutorBehavior`]. A request raised at a view-model is
//! forwarded to every ancestor with the path prepended, so rules declared
//! above can judge values deep below.

mod descendants;
mod executor;
mod request;
mod result;
mod validator;

pub use descendants::{DescendantsValidatorBehavior, PropertyValidationBehavior};
pub use executor::ValidatorExecutorBehavior;
pub use request::{ValidationRequest, ValidationScope};
pub use result::{ErrorTarget, ValidationError, ValidationResult};
pub use validator::{
    CompositeValidator, FnValidator, MaxLengthValidator, RequiredValidator, ValidationArgs,
    Validator,
};

pub(crate) use executor::validate_at;
