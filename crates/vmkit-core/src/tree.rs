//! View-model tree
//!
//! [`ViewModelTree`] owns every view-model instance in an arena addressed by
//! [`VmId`]. All mutations run inside a batch: changes announced while the
//! batch is open are collected, deduplicated and dispatched up the parent
//! links when the outermost operation finishes, and the resulting
//! notifications are then handed to subscribers.
//!
//! After each mutation the tree recomputes the validation results of the
//! affected view-models and announces every result that differs from the
//! one last announced for the same target.

use crate::behavior::{BehaviorContext, Capability, ReadContext, RefreshOptions};
use crate::config::{RevalidationExtent, TreeConfig};
use crate::descriptor::{PropertyInfo, PropertyKind, VmDescriptor};
use crate::error::ViewModelError;
use crate::notify::{ChangeArgs, ChangeType, Notification, SubscriptionId};
use crate::validation::{ValidationRequest, ValidationResult, ValidationScope};
use crate::value::FieldValue;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;
use vmkit_path::{Path, PropertyKey, StepResolver, VmId};

struct VmNode {
    descriptor: Rc<VmDescriptor>,
    name: Option<String>,
    fields: Vec<FieldValue>,
    parents: Vec<VmId>,
}

struct Subscriber {
    id: SubscriptionId,
    vm: VmId,
    callback: Box<dyn FnMut(&Notification)>,
}

#[derive(Debug, Clone)]
struct UndoEntry {
    vm: VmId,
    key: PropertyKey,
    previous: FieldValue,
}

/// Arena of view-model instances
pub struct ViewModelTree {
    config: TreeConfig,
    nodes: Vec<VmNode>,
    depth: usize,
    pending: IndexSet<(VmId, ChangeArgs)>,
    outbox: IndexSet<Notification>,
    // Baselines for change detection. Nodes are never removed and a detached
    // view-model may be attached again, so entries live as long as the tree.
    published: HashMap<Path, ValidationResult>,
    validity: HashMap<VmId, bool>,
    last_valid: HashMap<(VmId, PropertyKey), FieldValue>,
    undo_log: VecDeque<UndoEntry>,
    replaying: bool,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
}

impl Default for ViewModelTree {
    fn default() -> Self {
        Self::with_config(TreeConfig::default())
    }
}

impl ViewModelTree {
    /// Create empty tree with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty tree
    #[must_use]
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            depth: 0,
            pending: IndexSet::new(),
            outbox: IndexSet::new(),
            published: HashMap::new(),
            validity: HashMap::new(),
            last_valid: HashMap::new(),
            undo_log: VecDeque::new(),
            replaying: false,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of view-models
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no view-model
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `vm` exists
    #[inline]
    #[must_use]
    pub fn contains(&self, vm: VmId) -> bool {
        vm.index() < self.nodes.len()
    }

    // ---------------------------------------------------------------------
    // Creation and structure
    // ---------------------------------------------------------------------

    /// Create an instance of `descriptor`
    ///
    /// Computed properties are evaluated once; the validation results at
    /// creation become the baseline later changes are announced against.
    ///
    /// # Errors
    /// [`ViewModelError::TreeFull`] when ids are exhausted, or errors raised
    /// while computing initial values.
    pub fn create(&mut self, descriptor: &Rc<VmDescriptor>) -> Result<VmId, ViewModelError> {
        self.insert(descriptor, None)
    }

    /// Create a named instance of `descriptor`
    ///
    /// # Errors
    /// See [`Self::create`].
    pub fn create_named(
        &mut self,
        descriptor: &Rc<VmDescriptor>,
        name: impl Into<String>,
    ) -> Result<VmId, ViewModelError> {
        self.insert(descriptor, Some(name.into()))
    }

    fn insert(
        &mut self,
        descriptor: &Rc<VmDescriptor>,
        name: Option<String>,
    ) -> Result<VmId, ViewModelError> {
        let index = u32::try_from(self.nodes.len()).map_err(|_| ViewModelError::TreeFull)?;
        let vm = VmId::new(index);
        self.nodes.push(VmNode {
            descriptor: Rc::clone(descriptor),
            name,
            fields: descriptor
                .properties()
                .iter()
                .map(|property| property.kind().empty_value())
                .collect(),
            parents: Vec::new(),
        });

        let initialized = self
            .batch(|tree| {
                for property in descriptor.properties().iter().filter(|p| p.is_computed()) {
                    tree.refresh_property(vm, descriptor, property.key(), RefreshOptions::default())?;
                }
                Ok(())
            })
            .and_then(|()| self.seed_published(vm));
        if let Err(err) = initialized {
            tracing::debug!(%vm, descriptor = descriptor.name(), error = %err, "view-model creation rolled back");
            self.forget(vm);
            return Err(err);
        }

        tracing::debug!(%vm, descriptor = descriptor.name(), "view-model created");
        Ok(vm)
    }

    /// Drop the newest node and all bookkeeping about it
    fn forget(&mut self, vm: VmId) {
        self.nodes.truncate(vm.index());
        self.published.retain(|path, _| path.root().ok() != Some(vm));
        self.validity.remove(&vm);
        self.last_valid.retain(|(owner, _), _| *owner != vm);
        self.undo_log.retain(|entry| entry.vm != vm);
    }

    fn node(&self, vm: VmId) -> Result<&VmNode, ViewModelError> {
        self.nodes
            .get(vm.index())
            .ok_or(ViewModelError::UnknownViewModel(vm))
    }

    fn node_mut(&mut self, vm: VmId) -> Result<&mut VmNode, ViewModelError> {
        self.nodes
            .get_mut(vm.index())
            .ok_or(ViewModelError::UnknownViewModel(vm))
    }

    /// Descriptor of `vm`
    ///
    /// # Errors
    /// [`ViewModelError::UnknownViewModel`].
    pub fn descriptor(&self, vm: VmId) -> Result<&Rc<VmDescriptor>, ViewModelError> {
        Ok(&self.node(vm)?.descriptor)
    }

    /// Name given at creation
    #[must_use]
    pub fn name(&self, vm: VmId) -> Option<&str> {
        self.nodes.get(vm.index())?.name.as_deref()
    }

    /// First view-model created with `name`
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<VmId> {
        self.nodes
            .iter()
            .position(|node| node.name.as_deref() == Some(name))
            .and_then(|index| u32::try_from(index).ok())
            .map(VmId::new)
    }

    /// Distinct parents of `vm`, in attachment order
    ///
    /// # Errors
    /// [`ViewModelError::UnknownViewModel`].
    pub fn parents(&self, vm: VmId) -> Result<Vec<VmId>, ViewModelError> {
        let unique: IndexSet<VmId> = self.node(vm)?.parents.iter().copied().collect();
        Ok(unique.into_iter().collect())
    }

    /// Distinct children held in any field of `vm`
    ///
    /// # Errors
    /// [`ViewModelError::UnknownViewModel`].
    pub fn children(&self, vm: VmId) -> Result<Vec<VmId>, ViewModelError> {
        let unique: IndexSet<VmId> = self
            .node(vm)?
            .fields
            .iter()
            .flat_map(FieldValue::children)
            .collect();
        Ok(unique.into_iter().collect())
    }

    /// Path addressing `key` of `vm`
    ///
    /// # Errors
    /// Unknown view-model or property.
    pub fn property_path(&self, vm: VmId, key: &PropertyKey) -> Result<Path, ViewModelError> {
        let property = self.descriptor(vm)?.property(key)?;
        Ok(match property.kind() {
            PropertyKind::Collection => Path::collection(vm, key.clone()),
            PropertyKind::Value | PropertyKind::Child => Path::property(vm, key.clone()),
        })
    }

    /// Description of `key`
    ///
    /// # Errors
    /// Unknown view-model or property, or a chain without descriptor.
    pub fn property_info(&self, vm: VmId, key: &PropertyKey) -> Result<PropertyInfo, ViewModelError> {
        let chain = self.descriptor(vm)?.property(key)?.chain();
        chain
            .property_info()
            .ok_or_else(|| ViewModelError::MissingCapability {
                capability: Capability::ProvideDescriptor,
                subject: key.to_string(),
            })
    }

    fn roots_of(&self, vm: VmId) -> Result<Vec<VmId>, ViewModelError> {
        let mut roots = IndexSet::new();
        let mut seen = HashSet::new();
        let mut stack = vec![vm];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let parents = &self.node(current)?.parents;
            if parents.is_empty() {
                roots.insert(current);
            } else {
                stack.extend(parents.iter().copied());
            }
        }
        Ok(roots.into_iter().collect())
    }

    fn subtree(&self, starts: &[VmId]) -> Result<IndexSet<VmId>, ViewModelError> {
        let mut visited = IndexSet::new();
        let mut stack: Vec<VmId> = starts.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let mut children = self.children(current)?;
            children.reverse();
            stack.extend(children);
        }
        Ok(visited)
    }

    fn is_ancestor_or_self(&self, candidate: VmId, vm: VmId) -> Result<bool, ViewModelError> {
        let mut seen = HashSet::new();
        let mut stack = vec![vm];
        while let Some(current) = stack.pop() {
            if current == candidate {
                return Ok(true);
            }
            if seen.insert(current) {
                stack.extend(self.node(current)?.parents.iter().copied());
            }
        }
        Ok(false)
    }

    fn check_children(&self, vm: VmId, value: &FieldValue) -> Result<(), ViewModelError> {
        for child in value.children() {
            self.node(child)?;
            if self.is_ancestor_or_self(child, vm)? {
                return Err(ViewModelError::Cycle { parent: vm, child });
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Slot access used by the standard behaviors
    // ---------------------------------------------------------------------

    pub(crate) fn field(&self, vm: VmId, key: &PropertyKey) -> Result<&FieldValue, ViewModelError> {
        let descriptor = self.descriptor(vm)?;
        descriptor.property(key)?;
        self.node(vm)?
            .fields
            .get(key.index())
            .ok_or_else(|| ViewModelError::UnknownProperty {
                owner: descriptor.name().to_string(),
                property: key.to_string(),
            })
    }

    pub(crate) fn store_field(
        &mut self,
        vm: VmId,
        key: &PropertyKey,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        self.field(vm, key)?;
        let node = self.node_mut(vm)?;
        if let Some(slot) = node.fields.get_mut(key.index()) {
            *slot = value;
        }
        Ok(())
    }

    pub(crate) fn attach(&mut self, child: VmId, parent: VmId) -> Result<(), ViewModelError> {
        self.node_mut(child)?.parents.push(parent);
        Ok(())
    }

    pub(crate) fn detach(&mut self, child: VmId, parent: VmId) -> Result<(), ViewModelError> {
        let parents = &mut self.node_mut(child)?.parents;
        if let Some(position) = parents.iter().position(|p| *p == parent) {
            parents.remove(position);
        }
        Ok(())
    }

    pub(crate) fn record_undo(&mut self, vm: VmId, key: PropertyKey, previous: FieldValue) {
        if !self.config.record_undo || self.replaying {
            return;
        }
        self.undo_log.push_back(UndoEntry { vm, key, previous });
        while self.undo_log.len() > self.config.max_undo_entries {
            self.undo_log.pop_front();
        }
    }

    pub(crate) fn remember_valid(&mut self, vm: VmId, key: PropertyKey, value: FieldValue) {
        self.last_valid.insert((vm, key), value);
    }

    pub(crate) fn last_valid(&self, vm: VmId, key: &PropertyKey) -> Option<&FieldValue> {
        self.last_valid.get(&(vm, key.clone()))
    }

    /// Record the announced validity of `vm`; true if it flipped
    pub(crate) fn publish_validity(&mut self, vm: VmId, is_valid: bool) -> bool {
        self.validity.insert(vm, is_valid) != Some(is_valid)
    }

    pub(crate) fn emit(&mut self, notification: Notification) {
        self.outbox.insert(notification);
    }

    // ---------------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------------

    /// Current value of `key`
    ///
    /// # Errors
    /// Unknown view-model or property.
    pub fn get_value(&self, vm: VmId, key: &PropertyKey) -> Result<FieldValue, ViewModelError> {
        let chain = self.descriptor(vm)?.property(key)?.chain();
        chain.get_value(&ReadContext::new(self, vm))
    }

    /// Value of `key` as last known valid
    ///
    /// # Errors
    /// Unknown view-model or property.
    pub fn get_validated_value(&self, vm: VmId, key: &PropertyKey) -> Result<FieldValue, ViewModelError> {
        let chain = self.descriptor(vm)?.property(key)?.chain();
        chain.get_validated_value(&ReadContext::new(self, vm))
    }

    /// Assign `key` of `vm`
    ///
    /// Runs the property chain, refreshes declared dependents and
    /// revalidates the affected part of the tree before delivering
    /// notifications.
    ///
    /// # Errors
    /// - unknown view-model or property
    /// - [`ViewModelError::TypeMismatch`] for a value of the wrong kind
    /// - [`ViewModelError::Cycle`] if a child would become its own ancestor
    /// - [`ViewModelError::ReadOnlyProperty`] for computed properties
    pub fn set_value(
        &mut self,
        vm: VmId,
        key: &PropertyKey,
        value: impl Into<FieldValue>,
    ) -> Result<(), ViewModelError> {
        let value = value.into();
        self.batch(|tree| {
            let descriptor = Rc::clone(tree.descriptor(vm)?);
            let property = descriptor.property(key)?;
            property.check(&value)?;
            tree.check_children(vm, &value)?;
            tracing::debug!(%vm, property = %key, "set value");

            let previous = tree.field(vm, key)?.children();
            property
                .chain()
                .set_value(&mut BehaviorContext::new(tree, vm), value)?;
            tree.run_dependencies(vm, &descriptor, key)?;
            tree.after_mutation(vm, previous)
        })
    }

    /// Recompute `key`, or every property when `None`
    ///
    /// Child-valued properties refresh the children they hold.
    ///
    /// # Errors
    /// Unknown view-model or property, or errors of a computation.
    pub fn refresh(
        &mut self,
        vm: VmId,
        key: Option<&PropertyKey>,
        execute_dependencies: bool,
    ) -> Result<(), ViewModelError> {
        self.batch(|tree| {
            let descriptor = Rc::clone(tree.descriptor(vm)?);
            let keys: Vec<PropertyKey> = match key {
                Some(key) => vec![descriptor.property(key)?.key().clone()],
                None => descriptor
                    .properties()
                    .iter()
                    .map(|property| property.key().clone())
                    .collect(),
            };
            let options = RefreshOptions {
                execute_dependencies,
            };
            tracing::debug!(%vm, properties = keys.len(), execute_dependencies, "refresh");

            let mut previous = Vec::new();
            for key in &keys {
                previous.extend(tree.field(vm, key)?.children());
                tree.refresh_property(vm, &descriptor, key, options)?;
                if execute_dependencies {
                    tree.run_dependencies(vm, &descriptor, key)?;
                }
            }
            tree.after_mutation(vm, previous)
        })
    }

    fn refresh_property(
        &mut self,
        vm: VmId,
        descriptor: &VmDescriptor,
        key: &PropertyKey,
        options: RefreshOptions,
    ) -> Result<(), ViewModelError> {
        descriptor
            .property(key)?
            .chain()
            .refresh(&mut BehaviorContext::new(self, vm), options)
    }

    fn run_dependencies(
        &mut self,
        vm: VmId,
        descriptor: &VmDescriptor,
        source: &PropertyKey,
    ) -> Result<(), ViewModelError> {
        let options = RefreshOptions {
            execute_dependencies: false,
        };
        for target in descriptor.dependents_of(source) {
            tracing::trace!(%vm, source = %source, target = %target, "refresh dependent");
            self.refresh_property(vm, descriptor, target, options)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Collections
    // ---------------------------------------------------------------------

    fn items(&self, vm: VmId, key: &PropertyKey) -> Result<Vec<VmId>, ViewModelError> {
        match self.get_value(vm, key)? {
            FieldValue::Items(items) => Ok(items),
            other => Err(ViewModelError::TypeMismatch {
                property: key.to_string(),
                expected: PropertyKind::Collection,
                found: other.kind_name(),
            }),
        }
    }

    fn commit_items(
        &mut self,
        vm: VmId,
        key: &PropertyKey,
        items: Vec<VmId>,
        change: ChangeType,
    ) -> Result<(), ViewModelError> {
        self.batch(|tree| {
            tree.set_value(vm, key, FieldValue::Items(items))?;
            let path = tree.property_path(vm, key)?;
            tree.notify_change(ChangeArgs::new(path, change))
        })
    }

    /// Append `child` to collection `key`
    ///
    /// # Errors
    /// See [`Self::set_value`].
    pub fn add_item(&mut self, vm: VmId, key: &PropertyKey, child: VmId) -> Result<(), ViewModelError> {
        let mut items = self.items(vm, key)?;
        items.push(child);
        self.commit_items(vm, key, items, ChangeType::ItemsAdded)
    }

    /// Insert `child` at `index` of collection `key`
    ///
    /// # Errors
    /// [`ViewModelError::IndexOutOfBounds`], or see [`Self::set_value`].
    pub fn insert_item(
        &mut self,
        vm: VmId,
        key: &PropertyKey,
        index: usize,
        child: VmId,
    ) -> Result<(), ViewModelError> {
        let mut items = self.items(vm, key)?;
        if index > items.len() {
            return Err(ViewModelError::IndexOutOfBounds {
                index,
                len: items.len(),
            });
        }
        items.insert(index, child);
        self.commit_items(vm, key, items, ChangeType::ItemsAdded)
    }

    /// Remove the first occurrence of `child`; false if it was not held
    ///
    /// # Errors
    /// See [`Self::set_value`].
    pub fn remove_item(&mut self, vm: VmId, key: &PropertyKey, child: VmId) -> Result<bool, ViewModelError> {
        let mut items = self.items(vm, key)?;
        let Some(position) = items.iter().position(|item| *item == child) else {
            return Ok(false);
        };
        items.remove(position);
        self.commit_items(vm, key, items, ChangeType::ItemsRemoved)?;
        Ok(true)
    }

    /// Remove every item of collection `key`
    ///
    /// # Errors
    /// See [`Self::set_value`].
    pub fn clear_items(&mut self, vm: VmId, key: &PropertyKey) -> Result<(), ViewModelError> {
        if self.items(vm, key)?.is_empty() {
            return Ok(());
        }
        self.commit_items(vm, key, Vec::new(), ChangeType::CollectionReplaced)
    }

    /// Replace the contents of collection `key`
    ///
    /// # Errors
    /// See [`Self::set_value`].
    pub fn replace_items(
        &mut self,
        vm: VmId,
        key: &PropertyKey,
        items: Vec<VmId>,
    ) -> Result<(), ViewModelError> {
        self.items(vm, key)?;
        self.commit_items(vm, key, items, ChangeType::CollectionReplaced)
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    /// Validation result of `vm` at `scope`
    ///
    /// - `ViewModelValidationsOnly`: validators targeting the view-model itself
    /// - `SelfOnly`: those plus the results of every property
    /// - `SelfAndLoadedDescendants` and `Full`: additionally every descendant
    ///
    /// # Errors
    /// Configuration defects raised by validators.
    pub fn validation_result(
        &self,
        vm: VmId,
        scope: ValidationScope,
    ) -> Result<ValidationResult, ViewModelError> {
        let descriptor = self.descriptor(vm)?;
        let ctx = ReadContext::new(self, vm);
        let own = descriptor
            .chain()
            .validate(&ctx, &ValidationRequest::new(Path::of(vm), scope))?;
        if scope == ValidationScope::ViewModelValidationsOnly {
            return Ok(own);
        }

        let mut result = own;
        for property in descriptor.properties() {
            let request = ValidationRequest::new(self.property_path(vm, property.key())?, scope);
            result = result.join(&property.chain().validate(&ctx, &request)?);
        }
        Ok(result)
    }

    /// Validation result of one property
    ///
    /// # Errors
    /// Unknown view-model or property, or defects raised by validators.
    pub fn property_validation_result(
        &self,
        vm: VmId,
        key: &PropertyKey,
    ) -> Result<ValidationResult, ViewModelError> {
        let chain = self.descriptor(vm)?.property(key)?.chain();
        let request = ValidationRequest::new(self.property_path(vm, key)?, ValidationScope::SelfOnly);
        chain.validate(&ReadContext::new(self, vm), &request)
    }

    /// Whether `vm` and all its descendants are valid
    ///
    /// # Errors
    /// Configuration defects raised by validators.
    pub fn is_valid(&self, vm: VmId) -> Result<bool, ViewModelError> {
        Ok(self
            .validation_result(vm, ValidationScope::SelfAndLoadedDescendants)?
            .is_valid())
    }

    /// Recompute results at `scope` and announce those that changed
    ///
    /// # Errors
    /// Configuration defects raised by validators or change handlers.
    pub fn revalidate(&mut self, vm: VmId, scope: ValidationScope) -> Result<(), ViewModelError> {
        self.batch(|tree| {
            tree.node(vm)?;
            tracing::debug!(%vm, ?scope, "revalidate");
            let vms = if scope.includes_descendants() {
                tree.subtree(&[vm])?
            } else {
                IndexSet::from([vm])
            };
            tree.revalidate_targets(&vms, scope != ValidationScope::ViewModelValidationsOnly)
        })
    }

    fn targets(
        &self,
        vm: VmId,
        include_properties: bool,
    ) -> Result<Vec<(Path, ValidationResult)>, ViewModelError> {
        let mut targets = vec![(
            Path::of(vm),
            self.validation_result(vm, ValidationScope::ViewModelValidationsOnly)?,
        )];
        if include_properties {
            for property in self.descriptor(vm)?.properties() {
                targets.push((
                    self.property_path(vm, property.key())?,
                    self.property_validation_result(vm, property.key())?,
                ));
            }
        }
        Ok(targets)
    }

    fn seed_published(&mut self, vm: VmId) -> Result<(), ViewModelError> {
        for (path, result) in self.targets(vm, true)? {
            self.published.insert(path, result);
        }
        let is_valid = self.is_valid(vm)?;
        self.validity.insert(vm, is_valid);
        Ok(())
    }

    fn revalidate_targets(
        &mut self,
        vms: &IndexSet<VmId>,
        include_properties: bool,
    ) -> Result<(), ViewModelError> {
        let mut changed = Vec::new();
        for &vm in vms {
            for (path, result) in self.targets(vm, include_properties)? {
                let unchanged = self
                    .published
                    .get(&path)
                    .map_or(result.is_valid(), |published| *published == result);
                if !unchanged {
                    changed.push((path, result));
                }
            }
        }

        for (path, result) in changed {
            tracing::debug!(%path, %result, "validation result changed");
            self.published.insert(path.clone(), result);
            self.notify_change(ChangeArgs::validation_result_changed(path))?;
        }
        Ok(())
    }

    /// Revalidate after a write
    ///
    /// Under [`RevalidationExtent::Root`] every view-model below the roots of
    /// `vm` is revalidated, so a write costs time proportional to the size of
    /// its tree. [`RevalidationExtent::Owner`] limits this to the subtree of
    /// `vm` at the price of stale sibling results until the next
    /// [`Self::revalidate`].
    fn after_mutation(&mut self, vm: VmId, detached: Vec<VmId>) -> Result<(), ViewModelError> {
        if !self.config.revalidate_on_change {
            return Ok(());
        }
        let mut starts = match self.config.revalidation_extent {
            RevalidationExtent::Owner => vec![vm],
            RevalidationExtent::Root => self.roots_of(vm)?,
        };
        starts.extend(detached);
        let vms = self.subtree(&starts)?;
        self.revalidate_targets(&vms, true)
    }

    // ---------------------------------------------------------------------
    // Change dispatch
    // ---------------------------------------------------------------------

    /// Run `op` as one batch
    ///
    /// Changes announced inside are deduplicated and dispatched once the
    /// outermost batch ends, also when `op` fails.
    ///
    /// # Errors
    /// The error of `op`, else the first error raised while dispatching.
    pub fn batch<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, ViewModelError>,
    ) -> Result<T, ViewModelError> {
        self.depth += 1;
        let outcome = op(self);
        self.depth -= 1;
        if self.depth > 0 {
            return outcome;
        }

        match (outcome, self.flush()) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
            (Err(err), Err(dispatch)) => {
                tracing::warn!(error = %dispatch, "change dispatch failed after an earlier error");
                Err(err)
            }
        }
    }

    /// Announce a change rooted at an existing view-model
    ///
    /// Outside a batch the change is dispatched immediately.
    ///
    /// # Errors
    /// Path without root, unknown root, or errors of change handlers.
    pub fn notify_change(&mut self, args: ChangeArgs) -> Result<(), ViewModelError> {
        let root = args.path().root()?;
        self.node(root)?;
        self.pending.insert((root, args));
        if self.depth == 0 {
            self.flush()?;
        }
        Ok(())
    }

    /// Context for running behaviors of `vm` by hand
    ///
    /// # Errors
    /// [`ViewModelError::UnknownViewModel`].
    pub fn context(&mut self, vm: VmId) -> Result<BehaviorContext<'_>, ViewModelError> {
        self.node(vm)?;
        Ok(BehaviorContext::new(self, vm))
    }

    fn flush(&mut self) -> Result<(), ViewModelError> {
        self.depth += 1;
        let dispatched = self.dispatch_pending();
        self.depth -= 1;
        if dispatched.is_err() {
            self.pending.clear();
        }
        self.deliver();
        dispatched
    }

    fn dispatch_pending(&mut self) -> Result<(), ViewModelError> {
        while !self.pending.is_empty() {
            let round: Vec<_> = self.pending.drain(..).collect();
            for (root, args) in round {
                self.dispatch(root, &args)?;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, vm: VmId, args: &ChangeArgs) -> Result<(), ViewModelError> {
        tracing::trace!(%vm, %args, "dispatch change");
        let descriptor = Rc::clone(self.descriptor(vm)?);
        descriptor
            .chain()
            .handle_change(&mut BehaviorContext::new(self, vm), args)?;
        for parent in self.parents(vm)? {
            self.dispatch(parent, &args.prepend(parent))?;
        }
        Ok(())
    }

    fn deliver(&mut self) {
        let notifications: Vec<Notification> = self.outbox.drain(..).collect();
        for notification in &notifications {
            tracing::trace!(?notification, "deliver");
            for subscriber in self
                .subscribers
                .iter_mut()
                .filter(|subscriber| subscriber.vm == notification.vm())
            {
                (subscriber.callback)(notification);
            }
        }
    }

    /// Receive notifications raised on `vm`
    ///
    /// # Errors
    /// [`ViewModelError::UnknownViewModel`].
    pub fn subscribe(
        &mut self,
        vm: VmId,
        callback: impl FnMut(&Notification) + 'static,
    ) -> Result<SubscriptionId, ViewModelError> {
        self.node(vm)?;
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber {
            id,
            vm,
            callback: Box::new(callback),
        });
        Ok(id)
    }

    /// Remove a subscription; false if it was unknown
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        let removed = before != self.subscribers.len();
        if !removed {
            tracing::warn!(subscription = id.0, "unsubscribe of unknown subscription");
        }
        removed
    }

    // ---------------------------------------------------------------------
    // Undo
    // ---------------------------------------------------------------------

    /// Restore the value overwritten by the latest recorded write
    ///
    /// Returns false when nothing is left to undo. The restoring write is
    /// not recorded itself; when it fails the entry stays in the log.
    ///
    /// # Errors
    /// See [`Self::set_value`].
    pub fn undo(&mut self) -> Result<bool, ViewModelError> {
        let Some(entry) = self.undo_log.back().cloned() else {
            return Ok(false);
        };
        tracing::debug!(vm = %entry.vm, property = %entry.key, "undo");
        self.replaying = true;
        let outcome = self.set_value(entry.vm, &entry.key, entry.previous);
        self.replaying = false;
        outcome?;
        self.undo_log.pop_back();
        Ok(true)
    }

    /// Number of recorded writes
    #[inline]
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo_log.len()
    }
}

impl StepResolver for ViewModelTree {
    fn holds(&self, owner: VmId, property: &PropertyKey, child: VmId) -> bool {
        self.field(owner, property)
            .is_ok_and(|value| value.holds(child))
    }
}

impl Debug for ViewModelTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModelTree")
            .field("config", &self.config)
            .field("nodes", &self.nodes.len())
            .field("depth", &self.depth)
            .field("pending", &self.pending.len())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RequiredValidator;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    struct Fixture {
        task: Rc<VmDescriptor>,
        project: Rc<VmDescriptor>,
        title: PropertyKey,
        tasks: PropertyKey,
        lead: PropertyKey,
    }

    fn fixture() -> Fixture {
        let mut task = VmDescriptor::builder("TaskVM");
        let title = task.property("Title").unwrap();
        task.validate_property(&title, RequiredValidator::default()).unwrap();
        let task = task.build().unwrap();

        let mut project = VmDescriptor::builder("ProjectVM");
        let tasks = project.collection("Tasks").unwrap();
        let lead = project.child("Lead").unwrap();
        let project = project.build().unwrap();

        Fixture {
            task,
            project,
            title,
            tasks,
            lead,
        }
    }

    fn record(tree: &mut ViewModelTree, vm: VmId) -> Rc<RefCell<Vec<Notification>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        tree.subscribe(vm, move |n| sink.borrow_mut().push(n.clone()))
            .unwrap();
        seen
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let a = tree.create(&f.task).unwrap();
        let b = tree.create_named(&f.task, "second").unwrap();
        assert_eq!(a, VmId::new(0));
        assert_eq!(b, VmId::new(1));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.name(b), Some("second"));
        assert_eq!(tree.find_by_name("second"), Some(b));
    }

    #[test]
    fn set_and_get_value() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let task = tree.create(&f.task).unwrap();
        tree.set_value(task, &f.title, "Write docs").unwrap();
        assert_eq!(tree.get_value(task, &f.title).unwrap().as_str(), Some("Write docs"));
    }

    #[test]
    fn value_change_is_notified_once() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let task = tree.create(&f.task).unwrap();
        tree.set_value(task, &f.title, "a").unwrap();
        let seen = record(&mut tree, task);

        tree.set_value(task, &f.title, "b").unwrap();
        tree.set_value(task, &f.title, "b").unwrap();

        let values = seen
            .borrow()
            .iter()
            .filter(|n| matches!(n, Notification::ValueChanged { .. }))
            .count();
        assert_eq!(values, 1);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let project = tree.create(&f.project).unwrap();
        let err = tree.set_value(project, &f.lead, "text").unwrap_err();
        assert!(matches!(err, ViewModelError::TypeMismatch { .. }));
    }

    #[test]
    fn parent_links_follow_collection_edits() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let project = tree.create(&f.project).unwrap();
        let task = tree.create(&f.task).unwrap();

        tree.add_item(project, &f.tasks, task).unwrap();
        tree.add_item(project, &f.tasks, task).unwrap();
        assert_eq!(tree.parents(task).unwrap(), vec![project]);
        assert_eq!(tree.children(project).unwrap(), vec![task]);

        assert!(tree.remove_item(project, &f.tasks, task).unwrap());
        assert_eq!(tree.parents(task).unwrap(), vec![project]);
        tree.clear_items(project, &f.tasks).unwrap();
        assert!(tree.parents(task).unwrap().is_empty());
        assert!(!tree.remove_item(project, &f.tasks, task).unwrap());
    }

    #[test]
    fn insert_out_of_bounds() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let project = tree.create(&f.project).unwrap();
        let task = tree.create(&f.task).unwrap();
        let err = tree.insert_item(project, &f.tasks, 2, task).unwrap_err();
        assert!(matches!(err, ViewModelError::IndexOutOfBounds { index: 2, len: 0 }));
    }

    #[test]
    fn cycles_are_rejected() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let outer = tree.create(&f.project).unwrap();
        let inner = tree.create(&f.project).unwrap();
        tree.set_value(outer, &f.lead, inner).unwrap();

        let err = tree.set_value(inner, &f.lead, outer).unwrap_err();
        assert!(matches!(err, ViewModelError::Cycle { .. }));
        let err = tree.set_value(outer, &f.lead, outer).unwrap_err();
        assert!(matches!(err, ViewModelError::Cycle { .. }));
    }

    #[test]
    fn validation_scopes() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let project = tree.create(&f.project).unwrap();
        let task = tree.create(&f.task).unwrap();
        tree.set_value(project, &f.lead, task).unwrap();

        assert!(tree.validation_result(project, ValidationScope::SelfOnly).unwrap().is_valid());
        let deep = tree
            .validation_result(project, ValidationScope::SelfAndLoadedDescendants)
            .unwrap();
        assert_eq!(deep.len(), 1);
        assert_eq!(
            tree.validation_result(project, ValidationScope::Full).unwrap(),
            deep
        );
        assert!(!tree.is_valid(project).unwrap());
        assert!(tree
            .validation_result(task, ValidationScope::ViewModelValidationsOnly)
            .unwrap()
            .is_valid());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let task = tree.create(&f.task).unwrap();
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        let id = tree.subscribe(task, move |_| *sink.borrow_mut() += 1).unwrap();

        tree.set_value(task, &f.title, "a").unwrap();
        let delivered = *seen.borrow();
        assert!(delivered > 0);

        assert!(tree.unsubscribe(id));
        assert!(!tree.unsubscribe(id));
        tree.set_value(task, &f.title, "b").unwrap();
        assert_eq!(*seen.borrow(), delivered);
    }

    #[test]
    fn batch_delivers_at_the_end() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let task = tree.create(&f.task).unwrap();
        let seen = record(&mut tree, task);

        let title = f.title.clone();
        let probe = Rc::clone(&seen);
        tree.batch(|tree| {
            tree.set_value(task, &title, "a")?;
            tree.set_value(task, &title, "b")?;
            assert!(probe.borrow().is_empty());
            Ok(())
        })
        .unwrap();

        let values = seen
            .borrow()
            .iter()
            .filter(|n| matches!(n, Notification::ValueChanged { .. }))
            .count();
        assert_eq!(values, 1);
    }

    #[test]
    fn notify_change_requires_root() {
        let mut tree = ViewModelTree::new();
        let err = tree
            .notify_change(ChangeArgs::value_changed(Path::empty()))
            .unwrap_err();
        assert!(err.is_config());
        let err = tree
            .notify_change(ChangeArgs::value_changed(Path::of(VmId::new(7))))
            .unwrap_err();
        assert!(matches!(err, ViewModelError::UnknownViewModel(_)));
    }

    #[test]
    fn step_resolver_reflects_fields() {
        let f = fixture();
        let mut tree = ViewModelTree::new();
        let project = tree.create(&f.project).unwrap();
        let task = tree.create(&f.task).unwrap();
        assert!(!tree.holds(project, &f.lead, task));
        tree.set_value(project, &f.lead, task).unwrap();
        assert!(tree.holds(project, &f.lead, task));
        assert!(!tree.holds(project, &f.tasks, task));
    }
}
