//! Change notification
//!
//! Changes travel as [`ChangeArgs`] from the view-model where they happen up
//! through every ancestor, each hop prepending the ancestor to the path.
//! The [`ViewModelNotifierBehavior`] at each hop turns the changes that
//! concern its own view-model into [`Notification`]s for subscribers.

use crate::behavior::{Behavior, BehaviorContext, HandleChange, Next};
use crate::error::ViewModelError;
use std::fmt::{self, Display, Formatter};
use vmkit_path::{Path, PropertyKey, VmId};

/// Kind of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    /// A property value changed
    ValueChanged,
    /// The validation result of the target changed
    ValidationResultChanged,
    /// Items were added to a collection
    ItemsAdded,
    /// Items were removed from a collection
    ItemsRemoved,
    /// A collection's contents were replaced or cleared
    CollectionReplaced,
}

/// A change and where it happened
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeArgs {
    path: Path,
    change_type: ChangeType,
}

impl ChangeArgs {
    /// Create change
    #[inline]
    #[must_use]
    pub fn new(path: Path, change_type: ChangeType) -> Self {
        Self { path, change_type }
    }

    /// Value change of the property at `path`
    #[inline]
    #[must_use]
    pub fn value_changed(path: Path) -> Self {
        Self::new(path, ChangeType::ValueChanged)
    }

    /// Validation result change of the target at `path`
    #[inline]
    #[must_use]
    pub fn validation_result_changed(path: Path) -> Self {
        Self::new(path, ChangeType::ValidationResultChanged)
    }

    /// Location, rooted at the view-model currently handling the change
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of change
    #[inline]
    #[must_use]
    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    /// Same change as seen from `ancestor`
    #[must_use]
    pub fn prepend(&self, ancestor: VmId) -> Self {
        Self {
            path: self.path.prepend(ancestor),
            change_type: self.change_type,
        }
    }
}

impl Display for ChangeArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {}", self.change_type, self.path)
    }
}

/// Observable event delivered to subscribers of a view-model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Notification {
    /// One of the view-model's own properties changed value
    ValueChanged {
        /// View-model
        vm: VmId,
        /// Property
        property: PropertyKey,
    },

    /// The validation result of the view-model, or of one of its
    /// properties, changed
    ValidationResultChanged {
        /// View-model
        vm: VmId,
        /// Property, or `None` for the view-model level result
        property: Option<PropertyKey>,
    },

    /// Overall validity of the view-model and its descendants flipped
    ValidityChanged {
        /// View-model
        vm: VmId,
        /// New validity
        is_valid: bool,
    },
}

impl Notification {
    /// View-model the notification is raised on
    #[must_use]
    pub fn vm(&self) -> VmId {
        match self {
            Self::ValueChanged { vm, .. }
            | Self::ValidationResultChanged { vm, .. }
            | Self::ValidityChanged { vm, .. } => *vm,
        }
    }
}

/// Handle for removing a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Translates changes into notifications for its view-model
///
/// Own properties raise `ValueChanged` or `ValidationResultChanged` for the
/// property; a change of the view-model level result raises it without a
/// property; every validation change re-checks overall validity. Changes
/// below a child only affect validity.
#[derive(Debug, Default)]
pub struct ViewModelNotifierBehavior;

impl ViewModelNotifierBehavior {
    /// Create notifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for ViewModelNotifierBehavior {
    fn name(&self) -> &'static str {
        "ViewModelNotifier"
    }

    fn change_handler(&self) -> Option<&dyn HandleChange> {
        Some(self)
    }
}

impl HandleChange for ViewModelNotifierBehavior {
    fn handle_change(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        args: &ChangeArgs,
    ) -> Result<(), ViewModelError> {
        let vm = ctx.vm();
        let path = args.path();
        let change = args.change_type();
        let own = path
            .selects_only_property_of(vm)
            .or_else(|| path.selects_only_collection_of(vm));

        match (own, change) {
            (Some(property), ChangeType::ValueChanged) => ctx.emit(Notification::ValueChanged {
                vm,
                property: property.clone(),
            }),
            (Some(property), ChangeType::ValidationResultChanged) => {
                ctx.emit(Notification::ValidationResultChanged {
                    vm,
                    property: Some(property.clone()),
                });
            }
            (None, ChangeType::ValidationResultChanged) if path.selects_only(vm) => {
                ctx.emit(Notification::ValidationResultChanged { vm, property: None });
            }
            _ if path.selects_ancestor() => {
                tracing::trace!(%vm, %args, "descendant change");
            }
            _ => {}
        }

        if change == ChangeType::ValidationResultChanged {
            let is_valid = ctx.tree().is_valid(vm)?;
            if ctx.tree_mut().publish_validity(vm, is_valid) {
                ctx.emit(Notification::ValidityChanged { vm, is_valid });
            }
        }

        next.handle_change(ctx, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_keeps_change_type() {
        let key = PropertyKey::new("TaskVM", "Title", 0);
        let args = ChangeArgs::value_changed(Path::property(VmId::new(1), key));
        let lifted = args.prepend(VmId::new(0));
        assert_eq!(lifted.change_type(), ChangeType::ValueChanged);
        assert!(lifted.path().selects_ancestor());
        assert_eq!(lifted.to_string(), "ValueChanged at [vm#0, vm#1, TaskVM.Title]");
    }

    #[test]
    fn notification_vm() {
        let n = Notification::ValidityChanged {
            vm: VmId::new(4),
            is_valid: false,
        };
        assert_eq!(n.vm(), VmId::new(4));
    }
}
