//! Field values
//!
//! Scalar data is carried as [`serde_json::Value`]; references into the
//! tree are carried as [`VmId`]s.

use serde_json::Value;
use vmkit_path::VmId;

/// Value held by one property slot
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Opaque data
    Data(Value),

    /// Single child view-model, or none
    Child(Option<VmId>),

    /// Ordered child view-models; the same child may occur more than once
    Items(Vec<VmId>),
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Data(Value::Null)
    }
}

impl FieldValue {
    /// Null data
    #[inline]
    #[must_use]
    pub fn null() -> Self {
        Self::default()
    }

    /// Short name of the variant
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Child(_) => "child",
            Self::Items(_) => "items",
        }
    }

    /// Data payload
    #[inline]
    #[must_use]
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    /// String payload
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(Value::as_str)
    }

    /// Integer payload
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(Value::as_i64)
    }

    /// Boolean payload
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.as_data().and_then(Value::as_bool)
    }

    /// Null data, blank text, an empty child slot or an empty item list
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Data(Value::Null) => true,
            Self::Data(Value::String(text)) => text.trim().is_empty(),
            Self::Data(_) => false,
            Self::Child(child) => child.is_none(),
            Self::Items(items) => items.is_empty(),
        }
    }

    /// View-models referenced by this value, in order
    #[must_use]
    pub fn children(&self) -> Vec<VmId> {
        match self {
            Self::Data(_) => Vec::new(),
            Self::Child(child) => child.iter().copied().collect(),
            Self::Items(items) => items.clone(),
        }
    }

    /// Whether the value references `vm`
    #[must_use]
    pub fn holds(&self, vm: VmId) -> bool {
        match self {
            Self::Data(_) => false,
            Self::Child(child) => *child == Some(vm),
            Self::Items(items) => items.contains(&vm),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Data(Value::from(value))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Data(Value::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Data(Value::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Data(Value::from(value))
    }
}

impl From<VmId> for FieldValue {
    fn from(vm: VmId) -> Self {
        Self::Child(Some(vm))
    }
}

impl From<Vec<VmId>> for FieldValue {
    fn from(items: Vec<VmId>) -> Self {
        Self::Items(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values() {
        assert!(FieldValue::null().is_blank());
        assert!(FieldValue::from("  ").is_blank());
        assert!(FieldValue::Child(None).is_blank());
        assert!(FieldValue::Items(vec![]).is_blank());
        assert!(!FieldValue::from("John").is_blank());
        assert!(!FieldValue::from(0_i64).is_blank());
    }

    #[test]
    fn children_keep_multiplicity() {
        let a = VmId::new(1);
        let items = FieldValue::from(vec![a, a]);
        assert_eq!(items.children(), vec![a, a]);
        assert!(items.holds(a));
        assert!(!items.holds(VmId::new(2)));
    }

    #[test]
    fn accessors() {
        assert_eq!(FieldValue::from("x").as_str(), Some("x"));
        assert_eq!(FieldValue::from(7_i64).as_i64(), Some(7));
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(FieldValue::from(VmId::new(0)).as_str(), None);
    }
}
