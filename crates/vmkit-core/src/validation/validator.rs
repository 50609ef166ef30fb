//! Validators and their composition

use super::{ErrorTarget, ValidationError, ValidationRequest, ValidationResult};
use crate::error::ViewModelError;
use crate::tree::ViewModelTree;
use crate::value::FieldValue;
use serde_json::{json, Value};
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;
use vmkit_path::{Path, PathDefinition, PropertyKey, TargetKind, VmId};

/// A validation rule
///
/// Rule violations are reported through [`ValidationArgs::add_error`];
/// returning an error aborts the whole validation and is reserved for
/// defects such as reading an undeclared property.
pub trait Validator: Debug {
    /// Name recorded on produced errors
    fn name(&self) -> &str;

    /// Check the target described by `args`
    ///
    /// # Errors
    /// Configuration defects only.
    fn validate(&self, args: &mut ValidationArgs<'_>) -> Result<(), ViewModelError>;
}

/// What a validator sees while it runs
#[derive(Debug)]
pub struct ValidationArgs<'a> {
    tree: &'a ViewModelTree,
    validator: Rc<str>,
    path: &'a Path,
    owner: VmId,
    kind: TargetKind,
    errors: Vec<Rc<ValidationError>>,
}

impl<'a> ValidationArgs<'a> {
    fn new(tree: &'a ViewModelTree, validator: &str, path: &'a Path, owner: VmId, kind: TargetKind) -> Self {
        Self {
            tree,
            validator: Rc::from(validator),
            path,
            owner,
            kind,
            errors: Vec::new(),
        }
    }

    /// View-model declaring the validator
    #[inline]
    #[must_use]
    pub fn owner(&self) -> VmId {
        self.owner
    }

    /// View-model holding the target
    #[must_use]
    pub fn target_vm(&self) -> VmId {
        self.path.target_view_model().unwrap_or(self.owner)
    }

    /// Target property, if the target is a property or collection
    #[must_use]
    pub fn property(&self) -> Option<&'a PropertyKey> {
        self.path.target_property()
    }

    /// What the target is
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Full path from the owner to the target
    #[inline]
    #[must_use]
    pub fn path(&self) -> &'a Path {
        self.path
    }

    /// Tree, for rules spanning several view-models
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &'a ViewModelTree {
        self.tree
    }

    /// Current value of the target property
    ///
    /// # Errors
    /// [`ViewModelError::NotAPropertyTarget`] when the target is a view-model.
    pub fn value(&self) -> Result<FieldValue, ViewModelError> {
        let key = self.property().ok_or_else(|| ViewModelError::NotAPropertyTarget {
            validator: self.validator.to_string(),
        })?;
        self.tree.get_value(self.target_vm(), key)
    }

    /// Report a violation against the target
    pub fn add_error(&mut self, message: impl Into<String>) {
        let error = ValidationError::new(Rc::clone(&self.validator), self.target(), message);
        self.errors.push(Rc::new(error));
    }

    /// Report a violation with opaque details
    pub fn add_error_with_details(&mut self, message: impl Into<String>, details: Value) {
        let error = ValidationError::new(Rc::clone(&self.validator), self.target(), message)
            .with_details(details);
        self.errors.push(Rc::new(error));
    }

    /// Whether a violation was reported
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn target(&self) -> ErrorTarget {
        match self.property() {
            Some(key) => ErrorTarget::property(self.target_vm(), key.clone()),
            None => ErrorTarget::view_model(self.target_vm()),
        }
    }

    fn into_result(self) -> ValidationResult {
        ValidationResult::from_shared(self.errors)
    }
}

#[derive(Debug, Clone)]
struct ValidatorEntry {
    target: PathDefinition,
    validator: Rc<dyn Validator>,
}

/// Validators declared by one view-model type, each with its target
#[derive(Debug, Clone, Default)]
pub struct CompositeValidator {
    entries: Vec<ValidatorEntry>,
}

impl CompositeValidator {
    /// Create empty composite
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator for `target`
    pub fn add(&mut self, target: PathDefinition, validator: Rc<dyn Validator>) {
        self.entries.push(ValidatorEntry { target, validator });
    }

    /// With validator added
    #[inline]
    #[must_use]
    pub fn with(mut self, target: PathDefinition, validator: impl Validator + 'static) -> Self {
        self.add(target, Rc::new(validator));
        self
    }

    /// Number of validators
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no validator is declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every validator whose target matches the request path
    ///
    /// # Errors
    /// - [`ViewModelError::Path`] for a path without a root view-model
    /// - errors raised by a validator
    pub fn execute(
        &self,
        tree: &ViewModelTree,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, ViewModelError> {
        let owner = request.path().root()?;
        let mut result = ValidationResult::valid();
        for entry in &self.entries {
            let Some(kind) = entry.target.matches(request.path(), tree) else {
                continue;
            };
            let mut args = ValidationArgs::new(tree, entry.validator.name(), request.path(), owner, kind);
            entry.validator.validate(&mut args)?;
            result = result.join(&args.into_result());
        }
        Ok(result)
    }
}

/// Rejects blank values
#[derive(Debug, Clone)]
pub struct RequiredValidator {
    message: String,
}

impl RequiredValidator {
    /// Create validator reporting `message`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for RequiredValidator {
    fn default() -> Self {
        Self::new("value is required")
    }
}

impl Validator for RequiredValidator {
    fn name(&self) -> &str {
        "required"
    }

    fn validate(&self, args: &mut ValidationArgs<'_>) -> Result<(), ViewModelError> {
        if args.value()?.is_blank() {
            args.add_error(self.message.clone());
        }
        Ok(())
    }
}

/// Rejects text longer than a bound, counted in characters
#[derive(Debug, Clone, Copy)]
pub struct MaxLengthValidator {
    max: usize,
}

impl MaxLengthValidator {
    /// Create validator
    #[inline]
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Validator for MaxLengthValidator {
    fn name(&self) -> &str {
        "max_length"
    }

    fn validate(&self, args: &mut ValidationArgs<'_>) -> Result<(), ViewModelError> {
        let value = args.value()?;
        let Some(text) = value.as_str() else {
            return Ok(());
        };
        let length = text.chars().count();
        if length > self.max {
            args.add_error_with_details(
                format!("must be at most {} characters", self.max),
                json!({ "max": self.max, "actual": length }),
            );
        }
        Ok(())
    }
}

/// Validator from a closure
pub struct FnValidator<F> {
    name: String,
    check: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&mut ValidationArgs<'_>) -> Result<(), ViewModelError>,
{
    /// Create validator
    #[must_use]
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> Debug for FnValidator<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&mut ValidationArgs<'_>) -> Result<(), ViewModelError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, args: &mut ValidationArgs<'_>) -> Result<(), ViewModelError> {
        (self.check)(args)
    }
}
