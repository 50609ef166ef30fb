//! Per view-model validator execution and upward propagation

use super::{CompositeValidator, ValidationRequest, ValidationResult, Validator};
use crate::behavior::{Behavior, Next, ReadContext, Validate};
use crate::error::{ConfigError, ViewModelError};
use crate::tree::ViewModelTree;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use vmkit_path::{PathDefinition, VmId};

/// Runs the validators declared by one view-model type
///
/// After handling a request the executor forwards it to the executors of
/// every parent, with the parent prepended to the path. The validator set
/// is frozen by the first request.
#[derive(Debug)]
pub struct ValidatorExecutorBehavior {
    owner: Rc<str>,
    validators: RefCell<CompositeValidator>,
    sealed: Cell<bool>,
}

impl ValidatorExecutorBehavior {
    /// Create executor for the descriptor named `owner`
    #[must_use]
    pub fn new(owner: impl Into<Rc<str>>) -> Self {
        Self::with_validators(owner, CompositeValidator::new())
    }

    /// Create executor with an initial validator set
    #[must_use]
    pub fn with_validators(owner: impl Into<Rc<str>>, validators: CompositeValidator) -> Self {
        Self {
            owner: owner.into(),
            validators: RefCell::new(validators),
            sealed: Cell::new(false),
        }
    }

    /// Register a validator
    ///
    /// # Errors
    /// [`ConfigError::ExecutorSealed`] once a request was validated.
    pub fn add_validator(
        &self,
        target: PathDefinition,
        validator: Rc<dyn Validator>,
    ) -> Result<(), ConfigError> {
        if self.sealed.get() {
            return Err(ConfigError::ExecutorSealed {
                view_model: self.owner.to_string(),
            });
        }
        self.validators.borrow_mut().add(target, validator);
        Ok(())
    }

    /// Whether the validator set is frozen
    #[inline]
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.get()
    }

    /// Number of declared validators
    #[must_use]
    pub fn validator_count(&self) -> usize {
        self.validators.borrow().len()
    }

    /// Run own validators on `request`, then those of every ancestor
    ///
    /// # Errors
    /// Path and configuration defects raised while validating.
    pub fn execute(
        &self,
        tree: &ViewModelTree,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, ViewModelError> {
        self.sealed.set(true);
        let vm = request.path().root()?;
        let own = self.validators.borrow().execute(tree, request)?;
        let inherited = validate_parents(tree, vm, request)?;
        tracing::trace!(%request, errors = own.len() + inherited.len(), "executor ran");
        Ok(own.join(&inherited))
    }
}

impl Behavior for ValidatorExecutorBehavior {
    fn name(&self) -> &'static str {
        "ValidatorExecutor"
    }

    fn validation(&self) -> Option<&dyn Validate> {
        Some(self)
    }
}

impl Validate for ValidatorExecutorBehavior {
    fn validate(
        &self,
        ctx: &ReadContext<'_>,
        next: Next<'_>,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, ViewModelError> {
        let own = self.execute(ctx.tree(), request)?;
        Ok(own.join(&next.validate(ctx, request)?))
    }
}

/// Validate `request` at `vm`
///
/// Uses the executor of `vm` when it has one; a view-model without an
/// executor passes the request straight on to its parents.
pub(crate) fn validate_at(
    tree: &ViewModelTree,
    vm: VmId,
    request: &ValidationRequest,
) -> Result<ValidationResult, ViewModelError> {
    let descriptor = tree.descriptor(vm)?;
    match descriptor.chain().find::<ValidatorExecutorBehavior>() {
        Some(executor) => executor.execute(tree, request),
        None => validate_parents(tree, vm, request),
    }
}

fn validate_parents(
    tree: &ViewModelTree,
    vm: VmId,
    request: &ValidationRequest,
) -> Result<ValidationResult, ViewModelError> {
    let mut result = ValidationResult::valid();
    for parent in tree.parents(vm)? {
        let lifted = request.prepend_ancestor(parent);
        result = result.join(&validate_at(tree, parent, &lifted)?);
    }
    Ok(result)
}
