//! Validation results

use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;
use vmkit_path::{PropertyKey, VmId};

/// Location an error is reported against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorTarget {
    vm: VmId,
    property: Option<PropertyKey>,
}

impl ErrorTarget {
    /// Target a view-model as a whole
    #[inline]
    #[must_use]
    pub fn view_model(vm: VmId) -> Self {
        Self { vm, property: None }
    }

    /// Target one property
    #[inline]
    #[must_use]
    pub fn property(vm: VmId, key: PropertyKey) -> Self {
        Self {
            vm,
            property: Some(key),
        }
    }

    /// Target view-model
    #[inline]
    #[must_use]
    pub fn vm(&self) -> VmId {
        self.vm
    }

    /// Target property, if any
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&PropertyKey> {
        self.property.as_ref()
    }
}

impl Display for ErrorTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(key) => write!(f, "{}.{}", self.vm, key.name()),
            None => write!(f, "{}", self.vm),
        }
    }
}

/// One rule violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    validator: Rc<str>,
    target: ErrorTarget,
    message: String,
    details: Option<Value>,
}

impl ValidationError {
    /// Create error
    #[must_use]
    pub fn new(validator: impl Into<Rc<str>>, target: ErrorTarget, message: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            target,
            message: message.into(),
            details: None,
        }
    }

    /// With opaque details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Name of the validator that produced the error
    #[inline]
    #[must_use]
    pub fn validator(&self) -> &str {
        &self.validator
    }

    /// Reported location
    #[inline]
    #[must_use]
    pub fn target(&self) -> &ErrorTarget {
        &self.target
    }

    /// Message
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Opaque details
    #[inline]
    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.message)
    }
}

/// Ordered set of errors; valid when empty
///
/// Errors are shared: joining results keeps the instances, and an error
/// reached through two routes is counted once. Equality compares the error
/// sequences by content, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<Rc<ValidationError>>,
}

impl ValidationResult {
    /// The valid result
    #[inline]
    #[must_use]
    pub fn valid() -> Self {
        Self::default()
    }

    /// Result holding one error
    #[must_use]
    pub fn from_error(error: ValidationError) -> Self {
        Self {
            errors: vec![Rc::new(error)],
        }
    }

    /// Result holding shared errors
    #[must_use]
    pub fn from_shared(errors: Vec<Rc<ValidationError>>) -> Self {
        Self { errors }
    }

    /// Whether there are no errors
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Errors in order
    pub fn errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().map(|e| &**e)
    }

    /// Shared error instances in order
    #[inline]
    #[must_use]
    pub fn shared(&self) -> &[Rc<ValidationError>] {
        &self.errors
    }

    /// Union of two results
    ///
    /// A valid operand yields the other one unchanged. Otherwise the result
    /// holds the distinct instances of both, `self` first.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        if self.is_valid() {
            return other.clone();
        }
        if other.is_valid() {
            return self.clone();
        }
        let mut errors: Vec<Rc<ValidationError>> = Vec::with_capacity(self.len() + other.len());
        for error in self.errors.iter().chain(&other.errors) {
            if !errors.iter().any(|known| Rc::ptr_eq(known, error)) {
                errors.push(Rc::clone(error));
            }
        }
        Self { errors }
    }

    /// Join a sequence of results left to right
    #[must_use]
    pub fn join_all<'r>(results: impl IntoIterator<Item = &'r Self>) -> Self {
        results
            .into_iter()
            .fold(Self::valid(), |acc, result| acc.join(result))
    }
}

impl Display for ValidationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(f, "valid");
        }
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn error(message: &str) -> ValidationError {
        ValidationError::new("test", ErrorTarget::view_model(VmId::new(0)), message)
    }

    #[test]
    fn valid_is_identity() {
        let a = ValidationResult::from_error(error("a"));
        let valid = ValidationResult::valid();
        assert_eq!(valid.join(&a), a);
        assert_eq!(a.join(&valid), a);
        assert!(valid.join(&valid).is_valid());
    }

    #[test]
    fn join_keeps_instances_once() {
        let a = ValidationResult::from_error(error("a"));
        let b = ValidationResult::from_error(error("b"));
        let joined = a.join(&b).join(&a);
        assert_eq!(joined.len(), 2);
        assert!(Rc::ptr_eq(&joined.shared()[0], &a.shared()[0]));
    }

    #[test]
    fn equal_content_different_instances_both_kept() {
        let a = ValidationResult::from_error(error("same"));
        let b = ValidationResult::from_error(error("same"));
        assert_eq!(a, b);
        assert_eq!(a.join(&b).len(), 2);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let a = ValidationResult::from_error(error("a"));
        let b = ValidationResult::from_error(error("b"));
        assert_ne!(a.join(&b), b.join(&a));
    }

    #[test]
    fn display() {
        let target = ErrorTarget::property(VmId::new(2), PropertyKey::new("TaskVM", "Title", 0));
        let result = ValidationResult::from_error(ValidationError::new("required", target, "missing"));
        assert_eq!(result.to_string(), "vm#2.Title: missing");
        assert_eq!(ValidationResult::valid().to_string(), "valid");
    }

    fn pool() -> Vec<Rc<ValidationError>> {
        (0..6).map(|i| Rc::new(error(&format!("e{i}")))).collect()
    }

    fn pick(pool: &[Rc<ValidationError>], mask: u8) -> ValidationResult {
        let errors = pool
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, e)| Rc::clone(e))
            .collect();
        ValidationResult::from_shared(errors)
    }

    fn instances(result: &ValidationResult) -> Vec<*const ValidationError> {
        let mut ptrs: Vec<_> = result.shared().iter().map(Rc::as_ptr).collect();
        ptrs.sort();
        ptrs
    }

    proptest! {
        #[test]
        fn join_is_associative(a in 0u8..64, b in 0u8..64, c in 0u8..64) {
            let pool = pool();
            let (a, b, c) = (pick(&pool, a), pick(&pool, b), pick(&pool, c));
            prop_assert_eq!(a.join(&b).join(&c), a.join(&b.join(&c)));
        }

        #[test]
        fn join_is_idempotent(a in 0u8..64) {
            let pool = pool();
            let a = pick(&pool, a);
            prop_assert_eq!(a.join(&a), a.clone());
        }

        #[test]
        fn join_commutes_as_a_set(a in 0u8..64, b in 0u8..64) {
            let pool = pool();
            let (a, b) = (pick(&pool, a), pick(&pool, b));
            prop_assert_eq!(instances(&a.join(&b)), instances(&b.join(&a)));
        }

        #[test]
        fn join_is_valid_only_if_both_are(a in 0u8..64, b in 0u8..64) {
            let pool = pool();
            let (a, b) = (pick(&pool, a), pick(&pool, b));
            prop_assert_eq!(a.join(&b).is_valid(), a.is_valid() && b.is_valid());
        }
    }
}
