//! Testing utilities for vmkit workspace
//!
//! Shared fixtures, a notification recorder and tracing setup.

#![allow(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;
use vmkit_core::{
    FieldValue, FnValidator, Notification, PathDefinition, PropertyKey, RequiredValidator,
    ValidationArgs, ViewModelError, ViewModelTree, VmDescriptor, VmId,
};

/// Install a test subscriber honoring `RUST_LOG`; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Collects notifications delivered for one view-model
#[derive(Debug, Clone, Default)]
pub struct NotificationRecorder {
    seen: Rc<RefCell<Vec<Notification>>>,
}

impl NotificationRecorder {
    /// Subscribe a new recorder to `vm`
    pub fn attach(tree: &mut ViewModelTree, vm: VmId) -> anyhow::Result<Self> {
        let recorder = Self::default();
        let sink = Rc::clone(&recorder.seen);
        tree.subscribe(vm, move |n| sink.borrow_mut().push(n.clone()))?;
        Ok(recorder)
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen.borrow().clone()
    }

    pub fn clear(&self) {
        self.seen.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }

    /// Value changes of `property`
    pub fn value_changes(&self, property: &PropertyKey) -> usize {
        self.count(|n| matches!(n, Notification::ValueChanged { property: p, .. } if p == property))
    }

    /// Validation result changes of `property`, or of the view-model level when `None`
    pub fn result_changes(&self, property: Option<&PropertyKey>) -> usize {
        self.count(|n| {
            matches!(n, Notification::ValidationResultChanged { property: p, .. } if p.as_ref() == property)
        })
    }

    /// All validation result changes
    pub fn all_result_changes(&self) -> usize {
        self.count(|n| matches!(n, Notification::ValidationResultChanged { .. }))
    }

    /// Validity flips, in order
    pub fn validity(&self) -> Vec<bool> {
        self.seen
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notification::ValidityChanged { is_valid, .. } => Some(*is_valid),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&Notification) -> bool) -> usize {
        self.seen.borrow().iter().filter(|n| predicate(n)).count()
    }
}

/// Employee with a required `Name`
pub struct EmployeeFixture {
    pub descriptor: Rc<VmDescriptor>,
    pub name: PropertyKey,
}

pub fn employee_fixture() -> anyhow::Result<EmployeeFixture> {
    let mut builder = VmDescriptor::builder("EmployeeVM");
    let name = builder.property("Name")?;
    builder.validate_property(&name, RequiredValidator::new("name is required"))?;
    Ok(EmployeeFixture {
        descriptor: builder.build()?,
        name,
    })
}

/// Department holding a `Head` child and a `Staff` collection of plain
/// people, with a rule that staff names are unique
pub struct DepartmentFixture {
    pub department: Rc<VmDescriptor>,
    pub person: Rc<VmDescriptor>,
    pub head: PropertyKey,
    pub staff: PropertyKey,
    pub name: PropertyKey,
}

pub fn department_fixture() -> anyhow::Result<DepartmentFixture> {
    let mut person = VmDescriptor::builder("PersonVM");
    let name = person.property("Name")?;
    let person = person.build()?;

    let mut department = VmDescriptor::builder("DepartmentVM");
    let head = department.child("Head")?;
    let staff = department.collection("Staff")?;
    let staff_key = staff.clone();
    department.validate(
        PathDefinition::collection(staff.clone()).then_property(name.clone()),
        FnValidator::new("unique_name", move |args: &mut ValidationArgs<'_>| {
            let value = args.value()?;
            if value.is_blank() {
                return Ok(());
            }
            let Some(key) = args.property() else {
                return Ok(());
            };
            let duplicates = match args.tree().get_value(args.owner(), &staff_key)? {
                FieldValue::Items(items) => {
                    let mut seen = Vec::new();
                    for item in items {
                        if item != args.target_vm() && !seen.contains(&item) {
                            seen.push(item);
                        }
                    }
                    seen.into_iter()
                        .map(|item| args.tree().get_value(item, key))
                        .collect::<Result<Vec<_>, ViewModelError>>()?
                        .into_iter()
                        .filter(|other| *other == value)
                        .count()
                }
                _ => 0,
            };
            if duplicates > 0 {
                args.add_error("name must be unique");
            }
            Ok(())
        }),
    );
    Ok(DepartmentFixture {
        department: department.build()?,
        person,
        head,
        staff,
        name,
    })
}

/// Build a tree holding one department with two staff members named
/// `first` and `second`
pub fn staffed_department(
    fixture: &DepartmentFixture,
    first: &str,
    second: &str,
) -> anyhow::Result<(ViewModelTree, VmId, VmId, VmId)> {
    let mut tree = ViewModelTree::new();
    let department = tree.create_named(&fixture.department, "department")?;
    let a1 = tree.create_named(&fixture.person, "a1")?;
    let a2 = tree.create_named(&fixture.person, "a2")?;
    tree.set_value(a1, &fixture.name, first)?;
    tree.set_value(a2, &fixture.name, second)?;
    tree.add_item(department, &fixture.staff, a1)?;
    tree.add_item(department, &fixture.staff, a2)?;
    Ok((tree, department, a1, a2))
}
