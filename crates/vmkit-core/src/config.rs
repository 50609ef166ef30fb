//! Tree configuration
//!
//! Loaded from TOML or built in code:
//!
//! ```toml
//! revalidate_on_change = true
//! revalidation_extent = "root"
//! record_undo = true
//! max_undo_entries = 256
//! ```

use crate::error::ViewModelError;
use serde::{Deserialize, Serialize};

/// Subtree recomputed after a mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevalidationExtent {
    /// Only the mutated view-model and its descendants
    Owner,

    /// Whole tree under every root above the mutated view-model, so that
    /// cross-object rules on siblings are re-announced
    #[default]
    Root,
}

/// Runtime behavior of a [`ViewModelTree`](crate::ViewModelTree)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Recompute and announce validation results after every mutation
    pub revalidate_on_change: bool,
    /// How far the recomputation reaches
    pub revalidation_extent: RevalidationExtent,
    /// Record previous values of undoable properties
    pub record_undo: bool,
    /// Oldest undo entries are dropped beyond this bound
    pub max_undo_entries: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            revalidate_on_change: true,
            revalidation_extent: RevalidationExtent::Root,
            record_undo: true,
            max_undo_entries: 256,
        }
    }
}

impl TreeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a TOML document; missing keys keep defaults
    ///
    /// # Errors
    /// Returns [`ViewModelError::InvalidConfig`] on malformed input.
    pub fn from_toml_str(source: &str) -> Result<Self, ViewModelError> {
        Ok(toml::from_str(source)?)
    }

    /// With automatic revalidation
    #[inline]
    #[must_use]
    pub fn with_revalidate_on_change(mut self, enabled: bool) -> Self {
        self.revalidate_on_change = enabled;
        self
    }

    /// With revalidation extent
    #[inline]
    #[must_use]
    pub fn with_revalidation_extent(mut self, extent: RevalidationExtent) -> Self {
        self.revalidation_extent = extent;
        self
    }

    /// With undo recording
    #[inline]
    #[must_use]
    pub fn with_record_undo(mut self, enabled: bool) -> Self {
        self.record_undo = enabled;
        self
    }

    /// With undo log bound
    #[inline]
    #[must_use]
    pub fn with_max_undo_entries(mut self, max: usize) -> Self {
        self.max_undo_entries = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TreeConfig::default();
        assert!(config.revalidate_on_change);
        assert_eq!(config.revalidation_extent, RevalidationExtent::Root);
        assert_eq!(config.max_undo_entries, 256);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = TreeConfig::from_toml_str("revalidation_extent = \"owner\"\n").unwrap();
        assert_eq!(config.revalidation_extent, RevalidationExtent::Owner);
        assert!(config.record_undo);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = TreeConfig::from_toml_str("max_undo_entries = \"many\"").unwrap_err();
        assert!(matches!(err, ViewModelError::InvalidConfig(_)));
    }

    #[test]
    fn builder_setters() {
        let config = TreeConfig::new()
            .with_revalidate_on_change(false)
            .with_record_undo(false)
            .with_max_undo_entries(4);
        assert!(!config.revalidate_on_change);
        assert!(!config.record_undo);
        assert_eq!(config.max_undo_entries, 4);
    }
}
