//! Identities used as path steps
//!
//! Provides [`VmId`] for view-model instances and [`PropertyKey`] for declared
//! properties of a view-model type.

use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

/// Identity of a view-model instance inside one tree
///
/// Ids are handed out by the tree that owns the instance and are only
/// meaningful within that tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VmId(u32);

impl VmId {
    /// Create id from a raw arena index
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw arena index
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for VmId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "vm#{}", self.0)
    }
}

/// Identity of a declared property
///
/// Two keys are equal when they name the same property of the same
/// view-model type. The `index` is the slot position of the property in its
/// owner's field storage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey {
    owner: Rc<str>,
    name: Rc<str>,
    index: usize,
}

impl PropertyKey {
    /// Create a new key
    #[must_use]
    pub fn new(owner: impl Into<Rc<str>>, name: impl Into<Rc<str>>, index: usize) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            index,
        }
    }

    /// Name of the view-model type declaring the property
    #[inline]
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Property name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot index within the owner's fields
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Display for PropertyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_id_display() {
        assert_eq!(VmId::new(7).to_string(), "vm#7");
        assert_eq!(VmId::new(7).index(), 7);
    }

    #[test]
    fn property_key_equality_is_by_owner_name_and_slot() {
        let a = PropertyKey::new("Employee", "Name", 0);
        let b = PropertyKey::new("Employee", "Name", 0);
        let c = PropertyKey::new("Project", "Name", 0);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn property_key_display() {
        let key = PropertyKey::new("EmployeeVM", "Projects", 2);
        assert_eq!(key.to_string(), "EmployeeVM.Projects");
        assert_eq!(key.owner(), "EmployeeVM");
        assert_eq!(key.name(), "Projects");
    }
}
