//! Contexts handed to behaviors
//!
//! Reads and validation borrow the tree shared; mutation and change
//! handling borrow it exclusively. A behavior never holds a context beyond
//! the call it was given.

use crate::error::ViewModelError;
use crate::notify::{ChangeArgs, Notification};
use crate::tree::ViewModelTree;
use crate::value::FieldValue;
use vmkit_path::{PropertyKey, VmId};

/// Shared access to the tree, positioned at one view-model
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    tree: &'a ViewModelTree,
    vm: VmId,
}

impl<'a> ReadContext<'a> {
    /// Create context
    #[inline]
    #[must_use]
    pub fn new(tree: &'a ViewModelTree, vm: VmId) -> Self {
        Self { tree, vm }
    }

    /// View-model the chain runs for
    #[inline]
    #[must_use]
    pub fn vm(&self) -> VmId {
        self.vm
    }

    /// Whole tree
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &'a ViewModelTree {
        self.tree
    }

    /// Value of another property of the same view-model
    ///
    /// # Errors
    /// See [`ViewModelTree::get_value`].
    pub fn get_value(&self, key: &PropertyKey) -> Result<FieldValue, ViewModelError> {
        self.tree.get_value(self.vm, key)
    }
}

/// Exclusive access to the tree, positioned at one view-model
#[derive(Debug)]
pub struct BehaviorContext<'a> {
    tree: &'a mut ViewModelTree,
    vm: VmId,
}

impl<'a> BehaviorContext<'a> {
    /// Create context
    #[inline]
    #[must_use]
    pub fn new(tree: &'a mut ViewModelTree, vm: VmId) -> Self {
        Self { tree, vm }
    }

    /// View-model the chain runs for
    #[inline]
    #[must_use]
    pub fn vm(&self) -> VmId {
        self.vm
    }

    /// Shared view of the tree
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &ViewModelTree {
        &*self.tree
    }

    /// Exclusive view of the tree
    #[inline]
    pub fn tree_mut(&mut self) -> &mut ViewModelTree {
        &mut *self.tree
    }

    /// Reborrow as a read context
    #[inline]
    #[must_use]
    pub fn read(&self) -> ReadContext<'_> {
        ReadContext::new(&*self.tree, self.vm)
    }

    /// Announce a change; delivered when the outermost operation completes
    ///
    /// # Errors
    /// [`ViewModelError::Path`] if the path has no root view-model.
    pub fn notify_change(&mut self, args: ChangeArgs) -> Result<(), ViewModelError> {
        self.tree.notify_change(args)
    }

    /// Queue a notification for subscribers of its view-model
    #[inline]
    pub fn emit(&mut self, notification: Notification) {
        self.tree.emit(notification);
    }
}
