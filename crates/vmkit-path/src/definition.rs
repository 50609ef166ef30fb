//! Statically declared targets
//!
//! A [`PathDefinition`] is declared on a view-model type (for example the
//! target of a validator) and matched against runtime [`Path`]s that may
//! originate several hops below the declaring view-model.

use crate::key::{PropertyKey, VmId};
use crate::path::{Path, Step};
use std::fmt::{self, Display, Formatter};

/// Answers structural questions about the runtime tree during matching
pub trait StepResolver {
    /// Whether `property` of `owner` currently holds `child`, either as its
    /// value or as one of its collection items
    fn holds(&self, owner: VmId, property: &PropertyKey, child: VmId) -> bool;
}

/// One declared step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefinitionStep {
    /// A property; navigates into the child it holds or selects the property itself
    Property(PropertyKey),

    /// A collection; navigates into its items or selects the collection itself
    Collection(PropertyKey),
}

impl DefinitionStep {
    /// Declared property key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &PropertyKey {
        match self {
            Self::Property(key) | Self::Collection(key) => key,
        }
    }
}

/// What a matched runtime path selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A view-model as a whole
    ViewModel,

    /// A property of a view-model
    Property,

    /// A collection of a view-model
    Collection,
}

/// Declared target relative to an owning view-model
///
/// # Examples
/// - `[]` → the owner itself
/// - `[Employee.Name]` → the owner's `Name`
/// - `[Department.Employees, Employee.Name]` → `Name` of every item in `Employees`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathDefinition {
    steps: Vec<DefinitionStep>,
}

impl PathDefinition {
    /// Definition targeting the owner itself
    #[inline]
    #[must_use]
    pub fn owner() -> Self {
        Self::default()
    }

    /// Definition targeting a property of the owner
    #[inline]
    #[must_use]
    pub fn property(key: PropertyKey) -> Self {
        Self::owner().then_property(key)
    }

    /// Definition targeting a collection of the owner
    #[inline]
    #[must_use]
    pub fn collection(key: PropertyKey) -> Self {
        Self::owner().then_collection(key)
    }

    /// Append a property step
    #[inline]
    #[must_use]
    pub fn then_property(mut self, key: PropertyKey) -> Self {
        self.steps.push(DefinitionStep::Property(key));
        self
    }

    /// Append a collection step
    #[inline]
    #[must_use]
    pub fn then_collection(mut self, key: PropertyKey) -> Self {
        self.steps.push(DefinitionStep::Collection(key));
        self
    }

    /// Declared steps
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[DefinitionStep] {
        &self.steps
    }

    /// Match a runtime path rooted at the declaring view-model
    ///
    /// Every definition step must consume exactly one runtime step after the
    /// current view-model, and the runtime path must end where the definition
    /// ends. Returns what the path selects on success.
    pub fn matches<R>(&self, path: &Path, resolver: &R) -> Option<TargetKind>
    where
        R: StepResolver + ?Sized,
    {
        let steps = path.steps();
        let mut owner = match steps.first() {
            Some(Step::ViewModel(vm)) => *vm,
            _ => return None,
        };
        let mut position = 0;

        for (i, declared) in self.steps.iter().enumerate() {
            let last_declared = i + 1 == self.steps.len();
            let ends_path = position + 2 == steps.len();

            match (declared, steps.get(position + 1)?) {
                (DefinitionStep::Property(key), Step::Property(actual)) => {
                    return (key == actual && last_declared && ends_path)
                        .then_some(TargetKind::Property);
                }
                (DefinitionStep::Collection(key), Step::Collection(actual)) => {
                    return (key == actual && last_declared && ends_path)
                        .then_some(TargetKind::Collection);
                }
                (declared, Step::ViewModel(child)) => {
                    if !resolver.holds(owner, declared.key(), *child) {
                        return None;
                    }
                    owner = *child;
                    position += 1;
                }
                _ => return None,
            }
        }

        (position + 1 == steps.len()).then_some(TargetKind::ViewModel)
    }
}

impl Display for PathDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "<owner>");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " > ")?;
            }
            match step {
                DefinitionStep::Property(key) => write!(f, "{key}")?,
                DefinitionStep::Collection(key) => write!(f, "{key}[]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Links(HashSet<(VmId, PropertyKey, VmId)>);

    impl StepResolver for Links {
        fn holds(&self, owner: VmId, property: &PropertyKey, child: VmId) -> bool {
            self.0.contains(&(owner, property.clone(), child))
        }
    }

    fn employee(name: &str) -> PropertyKey {
        PropertyKey::new("EmployeeVM", name, 0)
    }

    fn project(name: &str) -> PropertyKey {
        PropertyKey::new("ProjectVM", name, 0)
    }

    const EMPLOYEE: VmId = VmId::new(0);
    const SELECTED: VmId = VmId::new(1);
    const ITEM: VmId = VmId::new(2);

    fn links() -> Links {
        let mut links = Links::default();
        links.0.insert((EMPLOYEE, employee("SelectedProject"), SELECTED));
        links.0.insert((EMPLOYEE, employee("Projects"), ITEM));
        links
    }

    #[test]
    fn property_matches_owner_plus_property() {
        let definition = PathDefinition::property(employee("SelectedProject"));
        let path = Path::property(EMPLOYEE, employee("SelectedProject"));
        assert_eq!(definition.matches(&path, &links()), Some(TargetKind::Property));
    }

    #[test]
    fn property_matches_owner_plus_child_view_model() {
        let definition = PathDefinition::property(employee("SelectedProject"));
        let path = Path::of(SELECTED).prepend(EMPLOYEE);
        assert_eq!(definition.matches(&path, &links()), Some(TargetKind::ViewModel));
    }

    #[test]
    fn property_matches_owner_plus_collection_item() {
        let definition = PathDefinition::property(employee("Projects"));
        let path = Path::of(ITEM).prepend(EMPLOYEE);
        assert_eq!(definition.matches(&path, &links()), Some(TargetKind::ViewModel));
    }

    #[test]
    fn property_does_not_match_collection_step() {
        let definition = PathDefinition::property(employee("Projects"));
        let path = Path::collection(EMPLOYEE, employee("Projects"));
        assert_eq!(definition.matches(&path, &links()), None);
    }

    #[test]
    fn collection_matches_collection_step() {
        let definition = PathDefinition::collection(employee("Projects"));
        let path = Path::collection(EMPLOYEE, employee("Projects"));
        assert_eq!(
            definition.matches(&path, &links()),
            Some(TargetKind::Collection)
        );
    }

    #[test]
    fn nested_definition_matches_item_property() {
        let definition =
            PathDefinition::collection(employee("Projects")).then_property(project("Name"));
        let path = Path::property(ITEM, project("Name")).prepend(EMPLOYEE);
        assert_eq!(definition.matches(&path, &links()), Some(TargetKind::Property));
    }

    #[test]
    fn nested_definition_rejects_unrelated_child() {
        let definition =
            PathDefinition::collection(employee("Projects")).then_property(project("Name"));
        let stranger = VmId::new(9);
        let path = Path::property(stranger, project("Name")).prepend(EMPLOYEE);
        assert_eq!(definition.matches(&path, &links()), None);
    }

    #[test]
    fn empty_path_never_matches() {
        let definition = PathDefinition::property(employee("SelectedProject"));
        assert_eq!(definition.matches(&Path::empty(), &links()), None);
    }

    #[test]
    fn single_view_model_does_not_match_property_definition() {
        let definition = PathDefinition::property(employee("SelectedProject"));
        assert_eq!(definition.matches(&Path::of(EMPLOYEE), &links()), None);
    }

    #[test]
    fn owner_definition_matches_only_owner() {
        let definition = PathDefinition::owner();
        assert_eq!(
            definition.matches(&Path::of(EMPLOYEE), &links()),
            Some(TargetKind::ViewModel)
        );
        let property = Path::property(EMPLOYEE, employee("Name"));
        assert_eq!(definition.matches(&property, &links()), None);
    }

    #[test]
    fn wrong_property_does_not_match() {
        let definition = PathDefinition::property(employee("SelectedProject"));
        let path = Path::property(EMPLOYEE, employee("Name"));
        assert_eq!(definition.matches(&path, &links()), None);
    }

    #[test]
    fn definition_display() {
        let definition =
            PathDefinition::collection(employee("Projects")).then_property(project("Name"));
        assert_eq!(definition.to_string(), "EmployeeVM.Projects[] > ProjectVM.Name");
        assert_eq!(PathDefinition::owner().to_string(), "<owner>");
    }
}
