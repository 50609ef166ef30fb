//! Property-level validation behaviors

use super::{validate_at, ValidationRequest, ValidationResult, ValidationScope};
use crate::behavior::{
    Behavior, BehaviorContext, Next, ReadContext, Refresh, RefreshOptions, Validate, ValueAccess,
};
use crate::error::ViewModelError;
use crate::notify::ChangeArgs;
use crate::value::FieldValue;
use indexmap::IndexSet;

/// Routes validation of its property to the owner's executor
#[derive(Debug, Default)]
pub struct PropertyValidationBehavior;

impl PropertyValidationBehavior {
    /// Create behavior
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for PropertyValidationBehavior {
    fn name(&self) -> &'static str {
        "PropertyValidation"
    }

    fn validation(&self) -> Option<&dyn Validate> {
        Some(self)
    }
}

impl Validate for PropertyValidationBehavior {
    fn validate(
        &self,
        ctx: &ReadContext<'_>,
        next: Next<'_>,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, ViewModelError> {
        let key = next.require_property(self.name())?;
        let path = request.path();
        let targets_self = path
            .selects_only_property_of(ctx.vm())
            .or_else(|| path.selects_only_collection_of(ctx.vm()))
            == Some(key);

        let own = if targets_self {
            validate_at(ctx.tree(), ctx.vm(), request)?
        } else {
            ValidationResult::valid()
        };
        Ok(own.join(&next.validate(ctx, request)?))
    }
}

/// Tracks the aggregate validity of the child view-models a property holds
///
/// Adds the children's results to descendant-scoped requests, and raises a
/// `ValidationResultChanged` for its property when assigning or refreshing
/// changes the aggregate.
#[derive(Debug, Default)]
pub struct DescendantsValidatorBehavior;

impl DescendantsValidatorBehavior {
    /// Create behavior
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn children_result(
        ctx: &ReadContext<'_>,
        next: Next<'_>,
        scope: ValidationScope,
    ) -> Result<ValidationResult, ViewModelError> {
        let children: IndexSet<_> = next.get_value(ctx)?.children().into_iter().collect();
        let mut result = ValidationResult::valid();
        for child in children {
            result = result.join(&ctx.tree().validation_result(child, scope)?);
        }
        Ok(result)
    }

    fn announce_if_changed(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        before: &ValidationResult,
    ) -> Result<(), ViewModelError> {
        let after = Self::children_result(&ctx.read(), next, ValidationScope::SelfAndLoadedDescendants)?;
        if *before == after {
            return Ok(());
        }
        let key = next.require_property(self.name())?;
        let path = ctx.tree().property_path(ctx.vm(), key)?;
        tracing::debug!(%path, before = before.len(), after = after.len(), "descendant validity changed");
        ctx.notify_change(ChangeArgs::validation_result_changed(path))
    }
}

impl Behavior for DescendantsValidatorBehavior {
    fn name(&self) -> &'static str {
        "DescendantsValidator"
    }

    fn value_access(&self) -> Option<&dyn ValueAccess> {
        Some(self)
    }

    fn validation(&self) -> Option<&dyn Validate> {
        Some(self)
    }

    fn refresher(&self) -> Option<&dyn Refresh> {
        Some(self)
    }
}

impl ValueAccess for DescendantsValidatorBehavior {
    fn get_value(&self, ctx: &ReadContext<'_>, next: Next<'_>) -> Result<FieldValue, ViewModelError> {
        next.get_value(ctx)
    }

    fn set_value(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        let before = Self::children_result(&ctx.read(), next, ValidationScope::SelfAndLoadedDescendants)?;
        next.set_value(ctx, value)?;
        self.announce_if_changed(ctx, next, &before)
    }
}

impl Validate for DescendantsValidatorBehavior {
    fn validate(
        &self,
        ctx: &ReadContext<'_>,
        next: Next<'_>,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, ViewModelError> {
        let rest = next.validate(ctx, request)?;
        if !request.scope().includes_descendants() {
            return Ok(rest);
        }
        Ok(rest.join(&Self::children_result(ctx, next, request.scope())?))
    }
}

impl Refresh for DescendantsValidatorBehavior {
    fn refresh(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        options: RefreshOptions,
    ) -> Result<(), ViewModelError> {
        let before = Self::children_result(&ctx.read(), next, ValidationScope::SelfAndLoadedDescendants)?;
        next.refresh(ctx, options)?;

        let children: IndexSet<_> = next.get_value(&ctx.read())?.children().into_iter().collect();
        for child in children {
            ctx.tree_mut().refresh(child, None, options.execute_dependencies)?;
        }
        self.announce_if_changed(ctx, next, &before)
    }
}
