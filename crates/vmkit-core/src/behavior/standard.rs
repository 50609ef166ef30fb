//! Standard property behaviors
//!
//! The descriptor builder assembles these into every property chain:
//!
//! | behavior                     | capabilities                      |
//! |------------------------------|-----------------------------------|
//! | [`UndoRecorderBehavior`]     | value access                      |
//! | [`PropertyChangeBehavior`]   | value access, refresh             |
//! | [`DescriptorProviderBehavior`] | descriptor, initialize, change |
//! | [`ValidatedValueBehavior`]   | value access                      |
//! | [`ParentLinkBehavior`]       | value access                      |
//! | [`ValueStoreBehavior`]       | value access (terminal)           |
//! | [`ComputedValueBehavior`]    | value access (terminal), refresh  |

use super::{
    Behavior, BehaviorContext, HandleChange, Initialize, Next, ProvideDescriptor, ReadContext,
    Refresh, RefreshOptions, ValueAccess,
};
use crate::descriptor::PropertyInfo;
use crate::error::{ConfigError, ViewModelError};
use crate::notify::ChangeArgs;
use crate::value::FieldValue;
use once_cell::unsync::OnceCell;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;
use vmkit_path::PropertyKey;

/// Terminal store backed by the view-model's field slot
#[derive(Debug, Default)]
pub struct ValueStoreBehavior;

impl ValueStoreBehavior {
    /// Create store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for ValueStoreBehavior {
    fn name(&self) -> &'static str {
        "ValueStore"
    }

    fn value_access(&self) -> Option<&dyn ValueAccess> {
        Some(self)
    }
}

impl ValueAccess for ValueStoreBehavior {
    fn get_value(&self, ctx: &ReadContext<'_>, next: Next<'_>) -> Result<FieldValue, ViewModelError> {
        let key = next.require_property(self.name())?;
        Ok(ctx.tree().field(ctx.vm(), key)?.clone())
    }

    fn set_value(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        let key = next.require_property(self.name())?;
        let vm = ctx.vm();
        ctx.tree_mut().store_field(vm, key, value)
    }

    fn get_validated_value(
        &self,
        ctx: &ReadContext<'_>,
        next: Next<'_>,
    ) -> Result<FieldValue, ViewModelError> {
        let key = next.require_property(self.name())?;
        current_if_valid(ctx, key, self.get_value(ctx, next)?)
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

/// `current` when the property validates, else the empty value of its kind
fn current_if_valid(
    ctx: &ReadContext<'_>,
    key: &PropertyKey,
    current: FieldValue,
) -> Result<FieldValue, ViewModelError> {
    let tree = ctx.tree();
    if tree.property_validation_result(ctx.vm(), key)?.is_valid() {
        return Ok(current);
    }
    Ok(tree.descriptor(ctx.vm())?.property(key)?.kind().empty_value())
}

/// Computes a value from the current state of the tree
pub type ValueSource = Rc<dyn Fn(&ReadContext<'_>) -> Result<FieldValue, ViewModelError>>;

/// Terminal, read-only store refreshed from a [`ValueSource`]
pub struct ComputedValueBehavior {
    source: ValueSource,
}

impl ComputedValueBehavior {
    /// Create computed store
    #[inline]
    #[must_use]
    pub fn new(source: ValueSource) -> Self {
        Self { source }
    }
}

impl Debug for ComputedValueBehavior {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedValueBehavior").finish_non_exhaustive()
    }
}

impl Behavior for ComputedValueBehavior {
    fn name(&self) -> &'static str {
        "ComputedValue"
    }

    fn value_access(&self) -> Option<&dyn ValueAccess> {
        Some(self)
    }

    fn refresher(&self) -> Option<&dyn Refresh> {
        Some(self)
    }
}

impl ValueAccess for ComputedValueBehavior {
    fn get_value(&self, ctx: &ReadContext<'_>, next: Next<'_>) -> Result<FieldValue, ViewModelError> {
        let key = next.require_property(self.name())?;
        Ok(ctx.tree().field(ctx.vm(), key)?.clone())
    }

    fn set_value(
        &self,
        _ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        _value: FieldValue,
    ) -> Result<(), ViewModelError> {
        let key = next.require_property(self.name())?;
        Err(ViewModelError::ReadOnlyProperty(key.to_string()))
    }

    fn get_validated_value(
        &self,
        ctx: &ReadContext<'_>,
        next: Next<'_>,
    ) -> Result<FieldValue, ViewModelError> {
        let key = next.require_property(self.name())?;
        current_if_valid(ctx, key, self.get_value(ctx, next)?)
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

impl Refresh for ComputedValueBehavior {
    fn refresh(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        _options: RefreshOptions,
    ) -> Result<(), ViewModelError> {
        let key = next.require_property(self.name())?;
        let value = (self.source)(&ctx.read())?;
        let vm = ctx.vm();
        ctx.tree_mut().store_field(vm, key, value)
    }
}

/// Keeps the parent links of child view-models in step with the slot
#[derive(Debug, Default)]
pub struct ParentLinkBehavior;

impl ParentLinkBehavior {
    /// Create behavior
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for ParentLinkBehavior {
    fn name(&self) -> &'static str {
        "ParentLink"
    }

    fn value_access(&self) -> Option<&dyn ValueAccess> {
        Some(self)
    }
}

impl ValueAccess for ParentLinkBehavior {
    fn get_value(&self, ctx: &ReadContext<'_>, next: Next<'_>) -> Result<FieldValue, ViewModelError> {
        next.get_value(ctx)
    }

    fn set_value(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        let previous = next.get_value(&ctx.read())?.children();
        let current = value.children();
        next.set_value(ctx, value)?;

        let vm = ctx.vm();
        for child in previous {
            ctx.tree_mut().detach(child, vm)?;
        }
        for child in current {
            ctx.tree_mut().attach(child, vm)?;
        }
        Ok(())
    }
}

/// Announces value changes of its property
///
/// Compares the value before and after the rest of the chain ran and raises
/// one `ValueChanged` only when they differ.
#[derive(Debug, Default)]
pub struct PropertyChangeBehavior;

impl PropertyChangeBehavior {
    /// Create behavior
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn announce(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        previous: &FieldValue,
    ) -> Result<(), ViewModelError> {
        let current = next.get_value(&ctx.read())?;
        if *previous == current {
            return Ok(());
        }
        let key = next.require_property(self.name())?;
        let path = ctx.tree().property_path(ctx.vm(), key)?;
        let args = ChangeArgs::value_changed(path);
        ctx.notify_change(args.clone())?;
        next.handle_change(ctx, &args)
    }
}

impl Behavior for PropertyChangeBehavior {
    fn name(&self) -> &'static str {
        "PropertyChange"
    }

    fn value_access(&self) -> Option<&dyn ValueAccess> {
        Some(self)
    }

    fn refresher(&self) -> Option<&dyn Refresh> {
        Some(self)
    }
}

impl ValueAccess for PropertyChangeBehavior {
    fn get_value(&self, ctx: &ReadContext<'_>, next: Next<'_>) -> Result<FieldValue, ViewModelError> {
        next.get_value(ctx)
    }

    fn set_value(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        let previous = next.get_value(&ctx.read())?;
        next.set_value(ctx, value)?;
        self.announce(ctx, next, &previous)
    }
}

impl Refresh for PropertyChangeBehavior {
    fn refresh(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        options: RefreshOptions,
    ) -> Result<(), ViewModelError> {
        let previous = next.get_value(&ctx.read())?;
        next.refresh(ctx, options)?;
        self.announce(ctx, next, &previous)
    }
}

/// Describes its property; filled in once when the chain is built
#[derive(Debug, Default)]
pub struct DescriptorProviderBehavior {
    read_only: bool,
    info: OnceCell<PropertyInfo>,
}

impl DescriptorProviderBehavior {
    /// Create provider
    #[inline]
    #[must_use]
    pub fn new(read_only: bool) -> Self {
        Self {
            read_only,
            info: OnceCell::new(),
        }
    }
}

impl Behavior for DescriptorProviderBehavior {
    fn name(&self) -> &'static str {
        "DescriptorProvider"
    }

    fn descriptor_provider(&self) -> Option<&dyn ProvideDescriptor> {
        Some(self)
    }

    fn initializer(&self) -> Option<&dyn Initialize> {
        Some(self)
    }

    fn change_handler(&self) -> Option<&dyn HandleChange> {
        Some(self)
    }
}

impl ProvideDescriptor for DescriptorProviderBehavior {
    fn property_info(&self) -> Option<PropertyInfo> {
        self.info.get().cloned()
    }
}

impl Initialize for DescriptorProviderBehavior {
    fn initialize(&self, init: &super::InitContext) -> Result<(), ConfigError> {
        let (Some(key), Some(kind)) = (init.property(), init.kind()) else {
            return Err(ConfigError::PropertyChainRequired {
                behavior: self.name(),
            });
        };
        self.info
            .set(PropertyInfo::new(key.clone(), kind, self.read_only))
            .map_err(|_| ConfigError::Initialization {
                behavior: self.name(),
                reason: format!("{key} already initialized"),
            })
    }
}

impl HandleChange for DescriptorProviderBehavior {
    fn handle_change(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        args: &ChangeArgs,
    ) -> Result<(), ViewModelError> {
        tracing::trace!(vm = %ctx.vm(), path = %args.path(), change = ?args.change_type(), "property changed");
        next.handle_change(ctx, args)
    }
}

/// Records previous values so the tree can undo writes
#[derive(Debug, Default)]
pub struct UndoRecorderBehavior;

impl UndoRecorderBehavior {
    /// Create recorder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for UndoRecorderBehavior {
    fn name(&self) -> &'static str {
        "UndoRecorder"
    }

    fn value_access(&self) -> Option<&dyn ValueAccess> {
        Some(self)
    }
}

impl ValueAccess for UndoRecorderBehavior {
    fn get_value(&self, ctx: &ReadContext<'_>, next: Next<'_>) -> Result<FieldValue, ViewModelError> {
        next.get_value(ctx)
    }

    fn set_value(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        let key = next.require_property(self.name())?;
        let previous = next.get_value(&ctx.read())?;
        next.set_value(ctx, value)?;
        if next.get_value(&ctx.read())? != previous {
            let vm = ctx.vm();
            ctx.tree_mut().record_undo(vm, key.clone(), previous);
        }
        Ok(())
    }
}

/// Remembers the last value that passed validation
///
/// `get_validated_value` answers with the current value when it is valid
/// right now, otherwise with the remembered one.
#[derive(Debug, Default)]
pub struct ValidatedValueBehavior;

impl ValidatedValueBehavior {
    /// Create behavior
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for ValidatedValueBehavior {
    fn name(&self) -> &'static str {
        "ValidatedValue"
    }

    fn value_access(&self) -> Option<&dyn ValueAccess> {
        Some(self)
    }
}

impl ValueAccess for ValidatedValueBehavior {
    fn get_value(&self, ctx: &ReadContext<'_>, next: Next<'_>) -> Result<FieldValue, ViewModelError> {
        next.get_value(ctx)
    }

    fn set_value(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        let key = next.require_property(self.name())?;
        next.set_value(ctx, value)?;

        let vm = ctx.vm();
        if ctx.tree().property_validation_result(vm, key)?.is_valid() {
            let current = next.get_value(&ctx.read())?;
            ctx.tree_mut().remember_valid(vm, key.clone(), current);
        }
        Ok(())
    }

    fn get_validated_value(
        &self,
        ctx: &ReadContext<'_>,
        next: Next<'_>,
    ) -> Result<FieldValue, ViewModelError> {
        let key = next.require_property(self.name())?;
        let current = next.get_value(ctx)?;
        if ctx.tree().property_validation_result(ctx.vm(), key)?.is_valid() {
            return Ok(current);
        }
        Ok(ctx
            .tree()
            .last_valid(ctx.vm(), key)
            .cloned()
            .unwrap_or_default())
    }
}
