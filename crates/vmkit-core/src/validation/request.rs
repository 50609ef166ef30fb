//! Validation requests

use std::fmt::{self, Display, Formatter};
use vmkit_path::{Path, VmId};

/// Extent of a validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ValidationScope {
    /// The target itself: its own validators and, for a view-model, those of
    /// its properties
    #[default]
    SelfOnly,

    /// The target and every descendant currently held in its fields
    SelfAndLoadedDescendants,

    /// Only the view-model level validators of the target
    ViewModelValidationsOnly,

    /// The target and all descendants; every field is held in memory, so
    /// this equals [`Self::SelfAndLoadedDescendants`]
    Full,
}

impl ValidationScope {
    /// Whether descendants contribute
    #[inline]
    #[must_use]
    pub fn includes_descendants(self) -> bool {
        matches!(self, Self::SelfAndLoadedDescendants | Self::Full)
    }
}

/// Request routed through validator executors
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidationRequest {
    path: Path,
    scope: ValidationScope,
}

impl ValidationRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(path: Path, scope: ValidationScope) -> Self {
        Self { path, scope }
    }

    /// Target path, rooted at the view-model currently handling the request
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extent
    #[inline]
    #[must_use]
    pub fn scope(&self) -> ValidationScope {
        self.scope
    }

    /// Same request as seen from `ancestor`
    #[must_use]
    pub fn prepend_ancestor(&self, ancestor: VmId) -> Self {
        Self {
            path: self.path.prepend(ancestor),
            scope: self.scope,
        }
    }
}

impl Display for ValidationRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.path, self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmkit_path::PropertyKey;

    #[test]
    fn prepend_keeps_scope() {
        let name = PropertyKey::new("TaskVM", "Title", 0);
        let request = ValidationRequest::new(
            Path::property(VmId::new(1), name),
            ValidationScope::SelfAndLoadedDescendants,
        );
        let lifted = request.prepend_ancestor(VmId::new(0));
        assert_eq!(lifted.path().len(), 3);
        assert_eq!(lifted.path().root().unwrap(), VmId::new(0));
        assert_eq!(lifted.scope(), ValidationScope::SelfAndLoadedDescendants);
    }

    #[test]
    fn descendant_scopes() {
        assert!(ValidationScope::Full.includes_descendants());
        assert!(ValidationScope::SelfAndLoadedDescendants.includes_descendants());
        assert!(!ValidationScope::SelfOnly.includes_descendants());
        assert!(!ValidationScope::ViewModelValidationsOnly.includes_descendants());
    }
}
