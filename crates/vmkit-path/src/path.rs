//! Paths addressing locations in a view-model tree
//!
//! Provides [`Path`] and the exact-shape match predicates used to route
//! validation requests and change events.

use crate::key::{PropertyKey, VmId};
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};

/// One step of a [`Path`]
///
/// A `Property` or `Collection` step is owned by the `ViewModel` step
/// directly before it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// A view-model instance
    ViewModel(VmId),

    /// A scalar or child-valued property of the preceding view-model
    Property(PropertyKey),

    /// A collection-valued property of the preceding view-model
    Collection(PropertyKey),
}

impl Step {
    /// Kind of this step
    #[inline]
    #[must_use]
    pub fn kind(&self) -> StepKind {
        match self {
            Self::ViewModel(_) => StepKind::ViewModel,
            Self::Property(_) => StepKind::Property,
            Self::Collection(_) => StepKind::Collection,
        }
    }

    /// View-model of a `ViewModel` step
    #[inline]
    #[must_use]
    pub fn view_model(&self) -> Option<VmId> {
        match self {
            Self::ViewModel(vm) => Some(*vm),
            _ => None,
        }
    }

    /// Property key of a `Property` or `Collection` step
    #[inline]
    #[must_use]
    pub fn property(&self) -> Option<&PropertyKey> {
        match self {
            Self::Property(key) | Self::Collection(key) => Some(key),
            Self::ViewModel(_) => None,
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ViewModel(vm) => write!(f, "{vm}"),
            Self::Property(key) => write!(f, "{key}"),
            Self::Collection(key) => write!(f, "{key}[]"),
        }
    }
}

/// Step kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// View-model step
    ViewModel,

    /// Property step
    Property,

    /// Collection step
    Collection,
}

/// Location inside a runtime view-model tree
///
/// Immutable: every derivation returns a new path. A well-formed, non-empty
/// path starts with a view-model step, every property or collection step
/// follows a view-model step, and a property step can only be last.
///
/// # Examples
/// - `[employee, Employee.Name]` → the `Name` property of `employee`
/// - `[department, employee]` → `employee`, reached from `department`
/// - `[department, employee, Employee.Name]` → `employee.Name`, reached from `department`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(SmallVec<[Step; 4]>);

impl Path {
    /// Empty path
    ///
    /// Only useful as a seed for [`Path::prepend`]; root-requiring operations
    /// reject it.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    /// Path selecting a single view-model
    #[inline]
    #[must_use]
    pub fn of(vm: VmId) -> Self {
        let mut steps = SmallVec::new();
        steps.push(Step::ViewModel(vm));
        Self(steps)
    }

    /// Path selecting a property of a view-model
    #[inline]
    #[must_use]
    pub fn property(owner: VmId, key: PropertyKey) -> Self {
        let mut path = Self::of(owner);
        path.0.push(Step::Property(key));
        path
    }

    /// Path selecting a collection of a view-model
    #[inline]
    #[must_use]
    pub fn collection(owner: VmId, key: PropertyKey) -> Self {
        let mut path = Self::of(owner);
        path.0.push(Step::Collection(key));
        path
    }

    /// Create path from steps, checking well-formedness
    ///
    /// # Errors
    /// Returns error if `steps` is empty or not a well-formed path
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Result<Self, PathError> {
        let steps: SmallVec<[Step; 4]> = steps.into_iter().collect();
        if steps.is_empty() {
            return Err(PathError::Empty);
        }
        Self::check(&steps)?;
        Ok(Self(steps))
    }

    fn check(steps: &[Step]) -> Result<(), PathError> {
        if let Some(first) = steps.first() {
            if first.kind() != StepKind::ViewModel {
                return Err(PathError::MustStartWithViewModel);
            }
        }

        for (index, step) in steps.iter().enumerate().skip(1) {
            let follows_view_model = steps[index - 1].kind() == StepKind::ViewModel;
            let misplaced = match step.kind() {
                StepKind::ViewModel => false,
                StepKind::Collection => !follows_view_model,
                StepKind::Property => !follows_view_model || index + 1 != steps.len(),
            };
            if misplaced {
                return Err(PathError::MisplacedStep {
                    index,
                    step: step.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get path steps
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    /// Get step at position
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Step> {
        self.0.get(index)
    }

    /// Number of steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path has no steps
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prepend an ancestor view-model, returning new path
    #[must_use]
    pub fn prepend(&self, ancestor: VmId) -> Self {
        let mut steps = SmallVec::with_capacity(self.0.len() + 1);
        steps.push(Step::ViewModel(ancestor));
        steps.extend(self.0.iter().cloned());
        Self(steps)
    }

    /// Append a descendant view-model, returning new path
    ///
    /// # Errors
    /// Returns error if the path ends with a property step
    pub fn append_view_model(&self, vm: VmId) -> Result<Self, PathError> {
        self.append(Step::ViewModel(vm))
    }

    /// Append a property of the last view-model, returning new path
    ///
    /// # Errors
    /// Returns error if the path does not end with a view-model step
    pub fn with_property(&self, key: PropertyKey) -> Result<Self, PathError> {
        self.append(Step::Property(key))
    }

    /// Append a collection of the last view-model, returning new path
    ///
    /// # Errors
    /// Returns error if the path does not end with a view-model step
    pub fn with_collection(&self, key: PropertyKey) -> Result<Self, PathError> {
        self.append(Step::Collection(key))
    }

    fn append(&self, step: Step) -> Result<Self, PathError> {
        let mut steps = self.0.clone();
        steps.push(step);
        Self::check(&steps)?;
        Ok(Self(steps))
    }

    /// Root view-model of the path
    ///
    /// # Errors
    /// Returns error if the path is empty or does not start with a view-model
    pub fn root(&self) -> Result<VmId, PathError> {
        match self.0.first() {
            None => Err(PathError::Empty),
            Some(Step::ViewModel(vm)) => Ok(*vm),
            Some(_) => Err(PathError::MustStartWithViewModel),
        }
    }

    /// Last view-model step of the path
    #[must_use]
    pub fn target_view_model(&self) -> Option<VmId> {
        self.0.iter().rev().find_map(Step::view_model)
    }

    /// Trailing property or collection step, if the path ends with one
    #[must_use]
    pub fn target_property(&self) -> Option<&PropertyKey> {
        self.0.last().and_then(Step::property)
    }

    /// Path is exactly `[owner, Property]`
    #[must_use]
    pub fn selects_only_property_of(&self, owner: VmId) -> Option<&PropertyKey> {
        match self.0.as_slice() {
            [Step::ViewModel(vm), Step::Property(key)] if *vm == owner => Some(key),
            _ => None,
        }
    }

    /// Path is exactly `[owner, Collection]`
    #[must_use]
    pub fn selects_only_collection_of(&self, owner: VmId) -> Option<&PropertyKey> {
        match self.0.as_slice() {
            [Step::ViewModel(vm), Step::Collection(key)] if *vm == owner => Some(key),
            _ => None,
        }
    }

    /// Path is exactly `[single]`
    #[must_use]
    pub fn selects_only(&self, single: VmId) -> bool {
        matches!(self.0.as_slice(), [Step::ViewModel(vm)] if *vm == single)
    }

    /// Path starts with two view-model steps
    ///
    /// The location lies below an immediate child of the root, not on one of
    /// the root's own fields.
    #[must_use]
    pub fn selects_ancestor(&self) -> bool {
        matches!(
            self.0.as_slice(),
            [Step::ViewModel(_), Step::ViewModel(_), ..]
        )
    }

    /// Iterator over steps from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.0.iter()
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{step}")?;
        }
        write!(f, "]")
    }
}

/// Errors related to paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path has no steps
    #[error("path is empty")]
    Empty,

    /// First step is not a view-model
    #[error("path must start with a view-model step")]
    MustStartWithViewModel,

    /// Property or collection step in a position it cannot occupy
    #[error("misplaced step {step} at index {index}")]
    MisplacedStep {
        /// Position of the offending step
        index: usize,
        /// Rendered step
        step: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(name: &str) -> PropertyKey {
        PropertyKey::new("Employee", name, 0)
    }

    fn vm(i: u32) -> VmId {
        VmId::new(i)
    }

    #[test]
    fn path_new_rejects_empty() {
        assert_eq!(Path::new(Vec::new()), Err(PathError::Empty));
    }

    #[test]
    fn path_new_rejects_leading_property() {
        let result = Path::new(vec![Step::Property(key("Name"))]);
        assert_eq!(result, Err(PathError::MustStartWithViewModel));
    }

    #[test]
    fn path_new_rejects_property_in_the_middle() {
        let result = Path::new(vec![
            Step::ViewModel(vm(0)),
            Step::Property(key("Name")),
            Step::ViewModel(vm(1)),
        ]);
        assert!(matches!(result, Err(PathError::MisplacedStep { index: 1, .. })));
    }

    #[test]
    fn path_new_accepts_collection_followed_by_item() {
        let path = Path::new(vec![
            Step::ViewModel(vm(0)),
            Step::Collection(key("Projects")),
            Step::ViewModel(vm(1)),
        ])
        .unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.target_view_model(), Some(vm(1)));
    }

    #[test]
    fn path_prepend_keeps_original() {
        let original = Path::property(vm(1), key("Name"));
        let extended = original.prepend(vm(0));

        assert_eq!(original.len(), 2);
        assert_eq!(extended.len(), 3);
        assert_eq!(extended.root(), Ok(vm(0)));
        assert_eq!(extended.target_view_model(), Some(vm(1)));
    }

    #[test]
    fn path_prepend_on_empty_yields_single() {
        let path = Path::empty().prepend(vm(3));
        assert!(path.selects_only(vm(3)));
    }

    #[test]
    fn path_with_property_after_property_fails() {
        let path = Path::property(vm(0), key("Name"));
        assert!(path.with_property(key("Other")).is_err());
        assert!(path.append_view_model(vm(1)).is_err());
    }

    #[test]
    fn root_of_empty_path_fails() {
        assert_eq!(Path::empty().root(), Err(PathError::Empty));
    }

    #[test]
    fn selects_only_property_of_owner() {
        let path = Path::property(vm(0), key("Name"));
        assert_eq!(path.selects_only_property_of(vm(0)), Some(&key("Name")));
        assert_eq!(path.selects_only_property_of(vm(1)), None);
        assert_eq!(path.selects_only_collection_of(vm(0)), None);
    }

    #[test]
    fn selects_only_collection_of_owner() {
        let path = Path::collection(vm(0), key("Projects"));
        assert_eq!(
            path.selects_only_collection_of(vm(0)),
            Some(&key("Projects"))
        );
        assert_eq!(path.selects_only_property_of(vm(0)), None);
    }

    #[test]
    fn selects_only_single() {
        assert!(Path::of(vm(0)).selects_only(vm(0)));
        assert!(!Path::of(vm(0)).selects_only(vm(1)));
        assert!(!Path::property(vm(0), key("Name")).selects_only(vm(0)));
    }

    #[test]
    fn selects_ancestor_requires_two_leading_view_models() {
        let below_child = Path::property(vm(1), key("Name")).prepend(vm(0));
        assert!(below_child.selects_ancestor());
        assert!(!Path::property(vm(0), key("Name")).selects_ancestor());
        assert!(!Path::of(vm(0)).selects_ancestor());
        assert!(!Path::empty().selects_ancestor());
    }

    #[test]
    fn predicates_do_not_panic_on_empty_path() {
        let path = Path::empty();
        assert_eq!(path.selects_only_property_of(vm(0)), None);
        assert_eq!(path.selects_only_collection_of(vm(0)), None);
        assert!(!path.selects_only(vm(0)));
        assert!(!path.selects_ancestor());
    }

    #[test]
    fn path_display() {
        let path = Path::property(vm(1), key("Name")).prepend(vm(0));
        assert_eq!(path.to_string(), "[vm#0, vm#1, Employee.Name]");
        let collection = Path::collection(vm(0), key("Projects"));
        assert_eq!(collection.to_string(), "[vm#0, Employee.Projects[]]");
    }

    fn arb_path() -> impl Strategy<Value = Path> {
        // view-model chain, optionally ending in a property or collection step
        (
            proptest::collection::vec(0..4u32, 1..5),
            0..3u8,
            prop_oneof![Just("Name"), Just("Projects")],
        )
            .prop_map(|(vms, tail, name)| {
                let mut path = Path::empty();
                for id in vms.into_iter().rev() {
                    path = path.prepend(VmId::new(id));
                }
                match tail {
                    1 => path.with_property(key(name)).unwrap(),
                    2 => path.with_collection(key(name)).unwrap(),
                    _ => path,
                }
            })
    }

    proptest! {
        #[test]
        fn prop_at_most_one_predicate_matches(path in arb_path(), owner in 0..4u32) {
            let owner = VmId::new(owner);
            let matched = [
                path.selects_only_property_of(owner).is_some(),
                path.selects_only_collection_of(owner).is_some(),
                path.selects_only(owner),
                path.selects_ancestor(),
            ];
            prop_assert!(matched.iter().filter(|m| **m).count() <= 1);
        }

        #[test]
        fn prop_generated_paths_are_well_formed(path in arb_path()) {
            let rebuilt = Path::new(path.steps().to_vec());
            prop_assert_eq!(rebuilt, Ok(path.clone()));
            prop_assert!(path.root().is_ok());
        }
    }
}
