//! View-model descriptors
//!
//! A [`VmDescriptor`] declares one view-model type: its properties with
//! their behavior chains, the view-model chain, validators and refresh
//! dependencies. Descriptors are immutable once built and shared by every
//! instance of the type.

use crate::behavior::{
    Behavior, BehaviorChain, BehaviorChainBuilder, ComputedValueBehavior,
    DescriptorProviderBehavior, InitContext, InitHandlers, ParentLinkBehavior,
    PropertyChangeBehavior, ReadContext, UndoRecorderBehavior, ValidatedValueBehavior,
    ValueSource, ValueStoreBehavior,
};
use crate::error::{ConfigError, ViewModelError};
use crate::notify::ViewModelNotifierBehavior;
use crate::validation::{
    CompositeValidator, DescendantsValidatorBehavior, PropertyValidationBehavior,
    ValidatorExecutorBehavior, Validator,
};
use crate::value::FieldValue;
use std::rc::Rc;
use vmkit_path::{PathDefinition, PropertyKey};

/// Shape of the values a property holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Opaque data
    Value,
    /// At most one child view-model
    Child,
    /// Ordered child view-models
    Collection,
}

impl PropertyKind {
    /// Whether `value` fits this kind
    #[must_use]
    pub fn accepts(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (Self::Value, FieldValue::Data(_))
                | (Self::Child, FieldValue::Child(_))
                | (Self::Collection, FieldValue::Items(_))
        )
    }

    /// Initial slot value
    #[must_use]
    pub fn empty_value(self) -> FieldValue {
        match self {
            Self::Value => FieldValue::null(),
            Self::Child => FieldValue::Child(None),
            Self::Collection => FieldValue::Items(Vec::new()),
        }
    }
}

/// Public description of a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    key: PropertyKey,
    kind: PropertyKind,
    read_only: bool,
}

impl PropertyInfo {
    /// Create description
    #[inline]
    #[must_use]
    pub fn new(key: PropertyKey, kind: PropertyKind, read_only: bool) -> Self {
        Self {
            key,
            kind,
            read_only,
        }
    }

    /// Property key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// Property kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Whether writes are rejected
    #[inline]
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// One declared property and its chain
#[derive(Debug)]
pub struct PropertyDescriptor {
    key: PropertyKey,
    kind: PropertyKind,
    computed: bool,
    chain: BehaviorChain,
}

impl PropertyDescriptor {
    /// Property key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// Property kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Whether the value is computed
    #[inline]
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.computed
    }

    /// Behavior chain serving the property
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &BehaviorChain {
        &self.chain
    }

    /// Reject values of the wrong kind
    ///
    /// # Errors
    /// [`ViewModelError::TypeMismatch`].
    pub fn check(&self, value: &FieldValue) -> Result<(), ViewModelError> {
        if self.kind.accepts(value) {
            return Ok(());
        }
        Err(ViewModelError::TypeMismatch {
            property: self.key.to_string(),
            expected: self.kind,
            found: value.kind_name(),
        })
    }
}

/// Properties refreshed when `source` changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    source: PropertyKey,
    targets: Vec<PropertyKey>,
}

impl Dependency {
    /// Changed property
    #[inline]
    #[must_use]
    pub fn source(&self) -> &PropertyKey {
        &self.source
    }

    /// Properties to refresh
    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[PropertyKey] {
        &self.targets
    }
}

/// Declared view-model type
#[derive(Debug)]
pub struct VmDescriptor {
    name: Rc<str>,
    chain: BehaviorChain,
    properties: Vec<PropertyDescriptor>,
    dependencies: Vec<Dependency>,
}

impl VmDescriptor {
    /// Start declaring a view-model type
    #[must_use]
    pub fn builder(name: impl Into<Rc<str>>) -> VmDescriptorBuilder {
        VmDescriptorBuilder::new(name)
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// View-model chain
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &BehaviorChain {
        &self.chain
    }

    /// Declared properties in declaration order
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Descriptor of `key`
    ///
    /// # Errors
    /// [`ViewModelError::UnknownProperty`] if `key` is not declared here.
    pub fn property(&self, key: &PropertyKey) -> Result<&PropertyDescriptor, ViewModelError> {
        self.properties
            .get(key.index())
            .filter(|property| property.key == *key)
            .ok_or_else(|| ViewModelError::UnknownProperty {
                owner: self.name.to_string(),
                property: key.to_string(),
            })
    }

    /// Key of the property named `name`
    #[must_use]
    pub fn key(&self, name: &str) -> Option<&PropertyKey> {
        self.properties
            .iter()
            .map(PropertyDescriptor::key)
            .find(|key| key.name() == name)
    }

    /// Properties refreshed after `source` changes
    pub fn dependents_of<'d>(&'d self, source: &'d PropertyKey) -> impl Iterator<Item = &'d PropertyKey> {
        self.dependencies
            .iter()
            .filter(move |dependency| dependency.source == *source)
            .flat_map(|dependency| dependency.targets.iter())
    }

    /// Validator executor of the type
    #[must_use]
    pub fn executor(&self) -> Option<&ValidatorExecutorBehavior> {
        self.chain.find::<ValidatorExecutorBehavior>()
    }
}

struct PropertyDraft {
    key: PropertyKey,
    kind: PropertyKind,
    source: Option<ValueSource>,
    undoable: bool,
    keep_validated: bool,
    extra: Vec<Box<dyn Behavior>>,
}

/// Declares a [`VmDescriptor`]
///
/// # Examples
///
/// ```rust
/// use vmkit_core::{RequiredValidator, VmDescriptor};
///
/// let mut builder = VmDescriptor::builder("TaskVM");
/// let title = builder.property("Title").unwrap();
/// builder.validate_property(&title, RequiredValidator::default()).unwrap();
/// let descriptor = builder.build().unwrap();
/// assert_eq!(descriptor.key("Title"), Some(&title));
/// ```
pub struct VmDescriptorBuilder {
    name: Rc<str>,
    properties: Vec<PropertyDraft>,
    validators: CompositeValidator,
    dependencies: Vec<Dependency>,
    handlers: InitHandlers,
    view_model_behaviors: Vec<Box<dyn Behavior>>,
}

impl VmDescriptorBuilder {
    /// Create builder
    #[must_use]
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            validators: CompositeValidator::new(),
            dependencies: Vec::new(),
            handlers: InitHandlers::new(),
            view_model_behaviors: Vec::new(),
        }
    }

    fn declare(
        &mut self,
        name: &str,
        kind: PropertyKind,
        source: Option<ValueSource>,
    ) -> Result<PropertyKey, ConfigError> {
        if self.properties.iter().any(|draft| draft.key.name() == name) {
            return Err(ConfigError::DuplicateProperty {
                owner: self.name.to_string(),
                property: name.to_string(),
            });
        }
        let key = PropertyKey::new(Rc::clone(&self.name), name, self.properties.len());
        self.properties.push(PropertyDraft {
            key: key.clone(),
            kind,
            source,
            undoable: false,
            keep_validated: false,
            extra: Vec::new(),
        });
        Ok(key)
    }

    fn draft_mut(&mut self, key: &PropertyKey) -> Result<&mut PropertyDraft, ConfigError> {
        let owner = &self.name;
        self.properties
            .get_mut(key.index())
            .filter(|draft| draft.key == *key)
            .ok_or_else(|| ConfigError::ForeignProperty {
                owner: owner.to_string(),
                property: key.to_string(),
            })
    }

    /// Declare a data property
    ///
    /// # Errors
    /// [`ConfigError::DuplicateProperty`] if the name is taken.
    pub fn property(&mut self, name: &str) -> Result<PropertyKey, ConfigError> {
        self.declare(name, PropertyKind::Value, None)
    }

    /// Declare a property holding one child view-model
    ///
    /// # Errors
    /// [`ConfigError::DuplicateProperty`] if the name is taken.
    pub fn child(&mut self, name: &str) -> Result<PropertyKey, ConfigError> {
        self.declare(name, PropertyKind::Child, None)
    }

    /// Declare a property holding ordered child view-models
    ///
    /// # Errors
    /// [`ConfigError::DuplicateProperty`] if the name is taken.
    pub fn collection(&mut self, name: &str) -> Result<PropertyKey, ConfigError> {
        self.declare(name, PropertyKind::Collection, None)
    }

    /// Declare a read-only data property computed from `source`
    ///
    /// The value is computed when an instance is created and on refresh.
    ///
    /// # Errors
    /// [`ConfigError::DuplicateProperty`] if the name is taken.
    pub fn computed<F>(&mut self, name: &str, source: F) -> Result<PropertyKey, ConfigError>
    where
        F: Fn(&ReadContext<'_>) -> Result<FieldValue, ViewModelError> + 'static,
    {
        self.declare(name, PropertyKind::Value, Some(Rc::new(source)))
    }

    /// Record previous values of `key` for undo
    ///
    /// # Errors
    /// [`ConfigError::ForeignProperty`] if `key` is not declared here.
    pub fn undoable(&mut self, key: &PropertyKey) -> Result<(), ConfigError> {
        self.draft_mut(key)?.undoable = true;
        Ok(())
    }

    /// Remember the last valid value of `key`
    ///
    /// # Errors
    /// [`ConfigError::ForeignProperty`] if `key` is not declared here.
    pub fn keep_validated_value(&mut self, key: &PropertyKey) -> Result<(), ConfigError> {
        self.draft_mut(key)?.keep_validated = true;
        Ok(())
    }

    /// Insert a custom behavior into the chain of `key`, ahead of validation
    ///
    /// # Errors
    /// [`ConfigError::ForeignProperty`] if `key` is not declared here.
    pub fn add_behavior(&mut self, key: &PropertyKey, behavior: impl Behavior) -> Result<(), ConfigError> {
        self.draft_mut(key)?.extra.push(Box::new(behavior));
        Ok(())
    }

    /// Insert a custom behavior into the view-model chain, ahead of the notifier
    pub fn add_view_model_behavior(&mut self, behavior: impl Behavior) {
        self.view_model_behaviors.push(Box::new(behavior));
    }

    /// Declare a validator for `target`
    pub fn validate(&mut self, target: PathDefinition, validator: impl Validator + 'static) {
        self.validators.add(target, Rc::new(validator));
    }

    /// Declare a validator for a property of this type
    ///
    /// # Errors
    /// [`ConfigError::ForeignProperty`] if `key` is not declared here.
    pub fn validate_property(
        &mut self,
        key: &PropertyKey,
        validator: impl Validator + 'static,
    ) -> Result<(), ConfigError> {
        let target = match self.draft_mut(key)?.kind {
            PropertyKind::Collection => PathDefinition::collection(key.clone()),
            PropertyKind::Value | PropertyKind::Child => PathDefinition::property(key.clone()),
        };
        self.validate(target, validator);
        Ok(())
    }

    /// Declare a validator for the view-model as a whole
    pub fn validate_view_model(&mut self, validator: impl Validator + 'static) {
        self.validate(PathDefinition::owner(), validator);
    }

    /// Refresh `targets` whenever `source` changes
    ///
    /// # Errors
    /// [`ConfigError::ForeignProperty`] if any key is not declared here.
    pub fn on_change_of(&mut self, source: &PropertyKey, targets: &[PropertyKey]) -> Result<(), ConfigError> {
        self.draft_mut(source)?;
        for target in targets {
            self.draft_mut(target)?;
        }
        self.dependencies.push(Dependency {
            source: source.clone(),
            targets: targets.to_vec(),
        });
        Ok(())
    }

    /// Run `handler` for every `B` while the chains are built
    ///
    /// # Errors
    /// [`ConfigError::DuplicateInitializer`] if `B` already has a handler.
    pub fn on_initialize<B, F>(&mut self, handler: F) -> Result<(), ConfigError>
    where
        B: Behavior,
        F: Fn(&B, &InitContext) -> Result<(), ConfigError> + 'static,
    {
        self.handlers.register::<B, F>(handler)
    }

    /// Assemble all chains
    ///
    /// Property chains are laid out as undo recorder (optional), change
    /// announcement, descriptor, validated value (optional), custom
    /// behaviors, validation, descendant tracking and parent links for
    /// child-valued properties, and the terminal store.
    ///
    /// # Errors
    /// Any configuration error raised while building a chain.
    pub fn build(self) -> Result<Rc<VmDescriptor>, ConfigError> {
        let mut properties = Vec::with_capacity(self.properties.len());
        for draft in self.properties {
            let mut chain = BehaviorChainBuilder::for_property(draft.key.clone(), draft.kind);
            if draft.undoable {
                chain.push(Box::new(UndoRecorderBehavior::new()));
            }
            chain.push(Box::new(PropertyChangeBehavior::new()));
            chain.push(Box::new(DescriptorProviderBehavior::new(draft.source.is_some())));
            if draft.keep_validated {
                chain.push(Box::new(ValidatedValueBehavior::new()));
            }
            for behavior in draft.extra {
                chain.push(behavior);
            }
            chain.push(Box::new(PropertyValidationBehavior::new()));
            if draft.kind != PropertyKind::Value {
                chain.push(Box::new(DescendantsValidatorBehavior::new()));
                chain.push(Box::new(ParentLinkBehavior::new()));
            }
            let computed = draft.source.is_some();
            match draft.source {
                Some(source) => chain.push(Box::new(ComputedValueBehavior::new(source))),
                None => chain.push(Box::new(ValueStoreBehavior::new())),
            }
            properties.push(PropertyDescriptor {
                key: draft.key,
                kind: draft.kind,
                computed,
                chain: chain.build(&self.handlers)?,
            });
        }

        let mut chain = BehaviorChainBuilder::for_view_model(Rc::clone(&self.name)).with(
            ValidatorExecutorBehavior::with_validators(Rc::clone(&self.name), self.validators),
        );
        for behavior in self.view_model_behaviors {
            chain.push(behavior);
        }
        let chain = chain
            .with(ViewModelNotifierBehavior::new())
            .build(&self.handlers)?;

        tracing::debug!(
            descriptor = %self.name,
            properties = properties.len(),
            "descriptor built"
        );

        Ok(Rc::new(VmDescriptor {
            name: self.name,
            chain,
            properties,
            dependencies: self.dependencies,
        }))
    }
}
