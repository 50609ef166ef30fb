//! Custom behaviors, computed properties and undo driven through the tree

use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use vmkit_core::behavior::{ValueAccess, ValueStoreBehavior};
use vmkit_core::{
    Behavior, BehaviorContext, ChainSubject, ConfigError, FieldValue, Next, PropertyKey, PropertyKind,
    ReadContext, RevalidationExtent, TreeConfig, ViewModelError, ViewModelTree, VmDescriptor,
};
use vmkit_test_utils::{department_fixture, init_tracing, staffed_department, NotificationRecorder};

/// Stores text upper-cased
#[derive(Debug)]
struct Uppercase;

impl Behavior for Uppercase {
    fn name(&self) -> &'static str {
        "Uppercase"
    }

    fn value_access(&self) -> Option<&dyn ValueAccess> {
        Some(self)
    }
}

impl ValueAccess for Uppercase {
    fn get_value(&self, ctx: &ReadContext<'_>, next: Next<'_>) -> Result<FieldValue, ViewModelError> {
        next.get_value(ctx)
    }

    fn set_value(
        &self,
        ctx: &mut BehaviorContext<'_>,
        next: Next<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        let value = match value.as_str() {
            Some(text) => FieldValue::from(text.to_uppercase()),
            None => value,
        };
        next.set_value(ctx, value)
    }
}

#[test]
fn custom_behavior_rewrites_assigned_values() -> anyhow::Result<()> {
    init_tracing();
    let mut builder = VmDescriptor::builder("CodeVM");
    let code = builder.property("Code")?;
    builder.add_behavior(&code, Uppercase)?;
    let descriptor = builder.build()?;

    let chain = descriptor.property(&code)?.chain();
    assert!(chain.names().contains(&"Uppercase"));

    let mut tree = ViewModelTree::new();
    let vm = tree.create(&descriptor)?;
    let recorder = NotificationRecorder::attach(&mut tree, vm)?;
    tree.set_value(vm, &code, "abc")?;
    assert_eq!(tree.get_value(vm, &code)?.as_str(), Some("ABC"));
    assert_eq!(recorder.value_changes(&code), 1);

    // same value after rewriting
    tree.set_value(vm, &code, "Abc")?;
    assert_eq!(recorder.value_changes(&code), 1);
    Ok(())
}

#[test]
fn chains_seal_on_first_use() -> anyhow::Result<()> {
    let mut builder = VmDescriptor::builder("CodeVM");
    let code = builder.property("Code")?;
    let descriptor = builder.build()?;
    let chain = descriptor.property(&code)?.chain();
    assert!(!chain.is_sealed());

    let mut tree = ViewModelTree::new();
    let vm = tree.create(&descriptor)?;
    tree.get_value(vm, &code)?;
    assert!(chain.is_sealed());
    assert!(descriptor.chain().is_sealed());
    Ok(())
}

fn person() -> anyhow::Result<(Rc<VmDescriptor>, [PropertyKey; 3])> {
    let mut builder = VmDescriptor::builder("PersonVM");
    let first = builder.property("First")?;
    let last = builder.property("Last")?;
    let (f, l) = (first.clone(), last.clone());
    let full = builder.computed("Full", move |ctx| {
        let first = ctx.get_value(&f)?;
        let last = ctx.get_value(&l)?;
        let joined = format!(
            "{} {}",
            first.as_str().unwrap_or_default(),
            last.as_str().unwrap_or_default()
        );
        Ok(FieldValue::from(joined.trim().to_owned()))
    })?;
    builder.on_change_of(&first, &[full.clone()])?;
    builder.on_change_of(&last, &[full.clone()])?;
    Ok((builder.build()?, [first, last, full]))
}

#[test]
fn computed_property_follows_its_sources() -> anyhow::Result<()> {
    let (descriptor, [first, last, full]) = person()?;
    let mut tree = ViewModelTree::new();
    let vm = tree.create(&descriptor)?;
    assert_eq!(tree.get_value(vm, &full)?.as_str(), Some(""));

    let recorder = NotificationRecorder::attach(&mut tree, vm)?;
    tree.set_value(vm, &first, "Ada")?;
    tree.set_value(vm, &last, "Lovelace")?;
    assert_eq!(tree.get_value(vm, &full)?.as_str(), Some("Ada Lovelace"));
    assert_eq!(recorder.value_changes(&full), 2);
    assert!(tree.property_info(vm, &full)?.is_read_only());
    Ok(())
}

#[test]
fn computed_property_rejects_writes() -> anyhow::Result<()> {
    let (descriptor, [_, _, full]) = person()?;
    let mut tree = ViewModelTree::new();
    let vm = tree.create(&descriptor)?;
    let err = tree.set_value(vm, &full, "x").unwrap_err();
    assert!(matches!(err, ViewModelError::ReadOnlyProperty(_)));
    assert!(!err.is_config());
    Ok(())
}

#[test]
fn refresh_without_change_is_silent() -> anyhow::Result<()> {
    let stamp = Rc::new(Cell::new(1_i64));
    let source = Rc::clone(&stamp);
    let mut builder = VmDescriptor::builder("ClockVM");
    let now = builder.computed("Now", move |_| Ok(FieldValue::from(source.get())))?;
    let descriptor = builder.build()?;

    let mut tree = ViewModelTree::new();
    let vm = tree.create(&descriptor)?;
    let recorder = NotificationRecorder::attach(&mut tree, vm)?;

    tree.refresh(vm, Some(&now), true)?;
    assert!(recorder.is_empty());

    stamp.set(2);
    tree.refresh(vm, None, true)?;
    assert_eq!(tree.get_value(vm, &now)?.as_i64(), Some(2));
    assert_eq!(recorder.value_changes(&now), 1);
    Ok(())
}

#[test]
fn refreshing_an_owner_refreshes_its_children() -> anyhow::Result<()> {
    let stamp = Rc::new(Cell::new(1_i64));
    let source = Rc::clone(&stamp);
    let mut leaf = VmDescriptor::builder("LeafVM");
    let now = leaf.computed("Now", move |_| Ok(FieldValue::from(source.get())))?;
    let leaf = leaf.build()?;
    let mut root = VmDescriptor::builder("RootVM");
    let items = root.collection("Items")?;
    let root = root.build()?;

    let mut tree = ViewModelTree::new();
    let owner = tree.create(&root)?;
    let child = tree.create(&leaf)?;
    tree.add_item(owner, &items, child)?;

    stamp.set(5);
    tree.refresh(owner, None, true)?;
    assert_eq!(tree.get_value(child, &now)?.as_i64(), Some(5));
    Ok(())
}

#[test]
fn undo_restores_previous_values() -> anyhow::Result<()> {
    let mut builder = VmDescriptor::builder("NoteVM");
    let text = builder.property("Text")?;
    builder.undoable(&text)?;
    let descriptor = builder.build()?;

    let mut tree = ViewModelTree::new();
    let vm = tree.create(&descriptor)?;
    tree.set_value(vm, &text, "one")?;
    tree.set_value(vm, &text, "two")?;
    tree.set_value(vm, &text, "two")?;
    assert_eq!(tree.undo_len(), 2);

    assert!(tree.undo()?);
    assert_eq!(tree.get_value(vm, &text)?.as_str(), Some("one"));
    assert!(tree.undo()?);
    assert_eq!(tree.get_value(vm, &text)?, FieldValue::null());
    assert!(!tree.undo()?);
    Ok(())
}

#[test]
fn undo_log_is_bounded() -> anyhow::Result<()> {
    let mut builder = VmDescriptor::builder("NoteVM");
    let text = builder.property("Text")?;
    builder.undoable(&text)?;
    let descriptor = builder.build()?;

    let mut tree = ViewModelTree::with_config(TreeConfig::new().with_max_undo_entries(2));
    let vm = tree.create(&descriptor)?;
    for value in ["a", "b", "c", "d"] {
        tree.set_value(vm, &text, value)?;
    }
    assert_eq!(tree.undo_len(), 2);
    tree.undo()?;
    tree.undo()?;
    assert_eq!(tree.get_value(vm, &text)?.as_str(), Some("b"));
    Ok(())
}

#[test]
fn initializers_see_every_store() -> anyhow::Result<()> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut builder = VmDescriptor::builder("TaskVM");
    builder.property("Title")?;
    builder.collection("Steps")?;
    builder.on_initialize::<ValueStoreBehavior, _>(move |_, ctx| {
        if let ChainSubject::Property(key) = ctx.subject() {
            sink.borrow_mut().push((key.name().to_owned(), ctx.kind()));
        }
        Ok(())
    })?;
    builder.build()?;

    assert_eq!(
        *seen.borrow(),
        vec![
            ("Title".to_owned(), Some(PropertyKind::Value)),
            ("Steps".to_owned(), Some(PropertyKind::Collection)),
        ]
    );
    Ok(())
}

#[test]
fn failing_initializer_aborts_build() -> anyhow::Result<()> {
    let mut builder = VmDescriptor::builder("TaskVM");
    builder.property("Title")?;
    builder.on_initialize::<ValueStoreBehavior, _>(|_, _| {
        Err(ConfigError::Initialization {
            behavior: "ValueStore",
            reason: "storage offline".into(),
        })
    })?;
    let err = builder.build().unwrap_err();
    assert!(matches!(err, ConfigError::Initialization { .. }));
    Ok(())
}

#[test]
fn property_info_describes_kinds() -> anyhow::Result<()> {
    let fixture = department_fixture()?;
    let (tree, dept, _, _) = staffed_department(&fixture, "Ada", "Grace")?;
    let head = tree.property_info(dept, &fixture.head)?;
    assert_eq!(head.kind(), PropertyKind::Child);
    assert!(!head.is_read_only());
    assert_eq!(tree.property_info(dept, &fixture.staff)?.kind(), PropertyKind::Collection);
    Ok(())
}

#[test]
fn config_loads_from_toml() -> anyhow::Result<()> {
    let config = TreeConfig::from_toml_str(
        r#"
        revalidation_extent = "owner"
        max_undo_entries = 8
        "#,
    )?;
    assert_eq!(config.revalidation_extent, RevalidationExtent::Owner);
    assert_eq!(config.max_undo_entries, 8);
    assert!(config.revalidate_on_change);

    let broken = TreeConfig::from_toml_str("max_undo_entries = \"many\"").unwrap_err();
    assert!(matches!(broken, ViewModelError::InvalidConfig(_)));
    Ok(())
}

#[test]
fn failed_creation_leaves_no_node_behind() -> anyhow::Result<()> {
    let mut builder = VmDescriptor::builder("BrokenVM");
    builder.computed("Broken", |_| Err(ViewModelError::TreeFull))?;
    let broken = builder.build()?;
    let (healthy, [first, _, _]) = person()?;

    let mut tree = ViewModelTree::new();
    let kept = tree.create(&healthy)?;
    let err = tree.create(&broken).unwrap_err();
    assert!(matches!(err, ViewModelError::TreeFull));
    assert_eq!(tree.len(), 1);

    let next = tree.create(&healthy)?;
    assert_eq!(next.index(), 1);
    tree.set_value(kept, &first, "Ada")?;
    assert!(tree.is_valid(next)?);
    Ok(())
}

#[test]
fn failed_undo_keeps_its_entry() -> anyhow::Result<()> {
    let mut builder = VmDescriptor::builder("NodeVM");
    let next = builder.child("Next")?;
    let link = builder.child("Link")?;
    builder.undoable(&next)?;
    let descriptor = builder.build()?;

    let mut tree = ViewModelTree::new();
    let a = tree.create(&descriptor)?;
    let b = tree.create(&descriptor)?;
    tree.set_value(a, &next, b)?;
    tree.set_value(a, &next, FieldValue::Child(None))?;
    tree.set_value(b, &link, a)?;
    assert_eq!(tree.undo_len(), 2);

    // restoring a.Next = b would close a cycle through b.Link
    let err = tree.undo().unwrap_err();
    assert!(matches!(err, ViewModelError::Cycle { .. }));
    assert_eq!(tree.undo_len(), 2);
    assert_eq!(tree.get_value(a, &next)?, FieldValue::Child(None));

    tree.set_value(b, &link, FieldValue::Child(None))?;
    assert!(tree.undo()?);
    assert_eq!(tree.get_value(a, &next)?, FieldValue::Child(Some(b)));
    assert_eq!(tree.undo_len(), 1);
    Ok(())
}
