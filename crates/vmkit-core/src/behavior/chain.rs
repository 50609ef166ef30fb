//! Chain assembly, sealing and cursor dispatch

use super::{
    AsAny, Behavior, BehaviorContext, Capability, ReadContext, RefreshOptions,
};
use crate::descriptor::{PropertyInfo, PropertyKind};
use crate::error::{ConfigError, ViewModelError};
use crate::notify::ChangeArgs;
use crate::validation::{ValidationRequest, ValidationResult};
use crate::value::FieldValue;
use std::any::{type_name, Any, TypeId};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;
use vmkit_path::PropertyKey;

/// What a chain serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSubject {
    /// A view-model type, by descriptor name
    ViewModel(Rc<str>),

    /// One property
    Property(PropertyKey),
}

impl ChainSubject {
    /// Property served, if any
    #[inline]
    #[must_use]
    pub fn property(&self) -> Option<&PropertyKey> {
        match self {
            Self::ViewModel(_) => None,
            Self::Property(key) => Some(key),
        }
    }
}

impl Display for ChainSubject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ViewModel(name) => write!(f, "{name}"),
            Self::Property(key) => write!(f, "{key}"),
        }
    }
}

/// Context handed to initializers while a chain is built
#[derive(Debug, Clone)]
pub struct InitContext {
    subject: ChainSubject,
    kind: Option<PropertyKind>,
}

impl InitContext {
    /// Chain subject
    #[inline]
    #[must_use]
    pub fn subject(&self) -> &ChainSubject {
        &self.subject
    }

    /// Property served, if any
    #[inline]
    #[must_use]
    pub fn property(&self) -> Option<&PropertyKey> {
        self.subject.property()
    }

    /// Kind of the property served, if any
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<PropertyKind> {
        self.kind
    }
}

type InitHandler = Rc<dyn Fn(&dyn Behavior, &InitContext) -> Result<(), ConfigError>>;

/// Typed initialize handlers, at most one per behavior type
#[derive(Clone, Default)]
pub struct InitHandlers {
    handlers: HashMap<TypeId, InitHandler>,
}

impl InitHandlers {
    /// Create empty handler set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler run for every `B` in a chain being built
    ///
    /// # Errors
    /// [`ConfigError::DuplicateInitializer`] if `B` already has a handler.
    pub fn register<B, F>(&mut self, handler: F) -> Result<(), ConfigError>
    where
        B: Behavior,
        F: Fn(&B, &InitContext) -> Result<(), ConfigError> + 'static,
    {
        let id = TypeId::of::<B>();
        if self.handlers.contains_key(&id) {
            return Err(ConfigError::DuplicateInitializer {
                behavior: type_name::<B>(),
            });
        }
        let typed: InitHandler = Rc::new(move |behavior: &dyn Behavior, init: &InitContext| {
            match AsAny::as_any(behavior).downcast_ref::<B>() {
                Some(behavior) => handler(behavior, init),
                None => Ok(()),
            }
        });
        self.handlers.insert(id, typed);
        Ok(())
    }

    /// Number of registered handlers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn run(&self, behavior: &dyn Behavior, init: &InitContext) -> Result<(), ConfigError> {
        let id = Any::type_id(AsAny::as_any(behavior));
        match self.handlers.get(&id) {
            Some(handler) => handler(behavior, init),
            None => Ok(()),
        }
    }
}

impl Debug for InitHandlers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitHandlers")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Collects behaviors before a chain is built
///
/// `build` consumes the builder, so a chain is initialized exactly once.
#[derive(Debug)]
pub struct BehaviorChainBuilder {
    subject: ChainSubject,
    kind: Option<PropertyKind>,
    behaviors: Vec<Box<dyn Behavior>>,
}

impl BehaviorChainBuilder {
    /// Builder for a view-model chain
    #[must_use]
    pub fn for_view_model(name: impl Into<Rc<str>>) -> Self {
        Self {
            subject: ChainSubject::ViewModel(name.into()),
            kind: None,
            behaviors: Vec::new(),
        }
    }

    /// Builder for a property chain
    #[must_use]
    pub fn for_property(key: PropertyKey, kind: PropertyKind) -> Self {
        Self {
            subject: ChainSubject::Property(key),
            kind: Some(kind),
            behaviors: Vec::new(),
        }
    }

    /// With behavior appended
    #[inline]
    #[must_use]
    pub fn with(mut self, behavior: impl Behavior) -> Self {
        self.behaviors.push(Box::new(behavior));
        self
    }

    /// Append a boxed behavior
    #[inline]
    pub fn push(&mut self, behavior: Box<dyn Behavior>) {
        self.behaviors.push(behavior);
    }

    /// Run initializers in chain order and produce the chain
    ///
    /// Each behavior's own initializer runs first, then the typed handler
    /// registered for its type.
    ///
    /// # Errors
    /// - [`ConfigError::MissingTerminalStorage`] for a property chain whose
    ///   last value accessor is not terminal
    /// - any error raised by an initializer
    pub fn build(self, handlers: &InitHandlers) -> Result<BehaviorChain, ConfigError> {
        check_terminal(&self.subject, &self.behaviors)?;

        let init = InitContext {
            subject: self.subject.clone(),
            kind: self.kind,
        };
        for behavior in &self.behaviors {
            if let Some(initializer) = behavior.initializer() {
                initializer.initialize(&init)?;
            }
            handlers.run(&**behavior, &init)?;
        }

        tracing::trace!(
            subject = %self.subject,
            behaviors = self.behaviors.len(),
            "behavior chain built"
        );

        Ok(BehaviorChain {
            subject: self.subject,
            behaviors: self.behaviors,
            sealed: Cell::new(false),
        })
    }
}

fn check_terminal(subject: &ChainSubject, behaviors: &[Box<dyn Behavior>]) -> Result<(), ConfigError> {
    if subject.property().is_none() {
        return Ok(());
    }
    match behaviors.iter().rev().find_map(|b| b.value_access()) {
        Some(accessor) if accessor.is_terminal() => Ok(()),
        _ => Err(ConfigError::MissingTerminalStorage {
            subject: subject.to_string(),
        }),
    }
}

/// Ordered behaviors serving one subject
///
/// The chain seals itself on the first dispatched call; from then on its
/// membership is fixed.
pub struct BehaviorChain {
    subject: ChainSubject,
    behaviors: Vec<Box<dyn Behavior>>,
    sealed: Cell<bool>,
}

impl BehaviorChain {
    /// Chain subject
    #[inline]
    #[must_use]
    pub fn subject(&self) -> &ChainSubject {
        &self.subject
    }

    /// Number of behaviors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    /// Whether the chain has no behaviors
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Whether the chain has handled a call
    #[inline]
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.get()
    }

    /// Behavior names in chain order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.behaviors.iter().map(|b| b.name()).collect()
    }

    /// Whether any behavior implements `capability`
    #[must_use]
    pub fn implements(&self, capability: Capability) -> bool {
        self.position_of(capability, 0).is_some()
    }

    /// Index of the first implementor of `capability` at or after `from`
    #[must_use]
    pub fn position_of(&self, capability: Capability, from: usize) -> Option<usize> {
        self.behaviors
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, b)| capability.is_implemented_by(&***b))
            .map(|(index, _)| index)
    }

    /// First behavior of concrete type `B`
    #[must_use]
    pub fn find<B: Behavior>(&self) -> Option<&B> {
        self.behaviors
            .iter()
            .find_map(|b| AsAny::as_any(&**b).downcast_ref::<B>())
    }

    /// Append a behavior to an unsealed chain
    ///
    /// # Errors
    /// - [`ConfigError::ChainSealed`] once the chain handled a call
    /// - [`ConfigError::MissingTerminalStorage`] if the addition places a
    ///   value accessor behind the terminal store
    pub fn append(&mut self, behavior: impl Behavior) -> Result<(), ConfigError> {
        if self.is_sealed() {
            return Err(ConfigError::ChainSealed {
                subject: self.subject.to_string(),
            });
        }
        self.behaviors.push(Box::new(behavior));
        if let Err(err) = check_terminal(&self.subject, &self.behaviors) {
            self.behaviors.pop();
            return Err(err);
        }
        Ok(())
    }

    /// Description from the first descriptor provider
    #[must_use]
    pub fn property_info(&self) -> Option<PropertyInfo> {
        self.behaviors
            .iter()
            .find_map(|b| b.descriptor_provider())
            .and_then(|provider| provider.property_info())
    }

    fn start(&self) -> Next<'_> {
        self.sealed.set(true);
        Next {
            chain: self,
            position: 0,
        }
    }

    /// Get the value through the chain
    ///
    /// # Errors
    /// [`ViewModelError::MissingCapability`] if nothing provides value access.
    pub fn get_value(&self, ctx: &ReadContext<'_>) -> Result<FieldValue, ViewModelError> {
        self.start().get_value(ctx)
    }

    /// Set the value through the chain
    ///
    /// # Errors
    /// Errors raised by any behavior.
    pub fn set_value(
        &self,
        ctx: &mut BehaviorContext<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        self.start().set_value(ctx, value)
    }

    /// Get the last valid value through the chain
    ///
    /// # Errors
    /// Errors raised by any behavior.
    pub fn get_validated_value(&self, ctx: &ReadContext<'_>) -> Result<FieldValue, ViewModelError> {
        self.start().get_validated_value(ctx)
    }

    /// Validate through the chain; valid when nothing contributes
    ///
    /// # Errors
    /// Configuration defects raised by any behavior.
    pub fn validate(
        &self,
        ctx: &ReadContext<'_>,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, ViewModelError> {
        self.start().validate(ctx, request)
    }

    /// Deliver a change through the chain
    ///
    /// # Errors
    /// Errors raised by any behavior.
    pub fn handle_change(
        &self,
        ctx: &mut BehaviorContext<'_>,
        args: &ChangeArgs,
    ) -> Result<(), ViewModelError> {
        self.start().handle_change(ctx, args)
    }

    /// Refresh through the chain
    ///
    /// # Errors
    /// Errors raised by any behavior.
    pub fn refresh(
        &self,
        ctx: &mut BehaviorContext<'_>,
        options: RefreshOptions,
    ) -> Result<(), ViewModelError> {
        self.start().refresh(ctx, options)
    }
}

impl Debug for BehaviorChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorChain")
            .field("subject", &self.subject)
            .field("behaviors", &self.names())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

/// Cursor into a chain, handed to each behavior
///
/// Every operation scans forward from the cursor for the next implementor
/// of the matching capability.
#[derive(Clone, Copy)]
pub struct Next<'c> {
    chain: &'c BehaviorChain,
    position: usize,
}

impl<'c> Next<'c> {
    /// Chain subject
    #[inline]
    #[must_use]
    pub fn subject(&self) -> &'c ChainSubject {
        &self.chain.subject
    }

    /// Index the next scan starts at
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Property served by the chain
    ///
    /// # Errors
    /// [`ConfigError::PropertyChainRequired`] on a view-model chain.
    pub fn require_property(&self, behavior: &'static str) -> Result<&'c PropertyKey, ConfigError> {
        self.chain
            .subject
            .property()
            .ok_or(ConfigError::PropertyChainRequired { behavior })
    }

    fn locate<T, F>(&self, pick: F) -> Option<(&'c T, Next<'c>)>
    where
        T: ?Sized,
        F: Fn(&'c dyn Behavior) -> Option<&'c T>,
    {
        self.chain
            .behaviors
            .iter()
            .enumerate()
            .skip(self.position)
            .find_map(|(index, behavior)| {
                pick(&**behavior).map(|capability| {
                    let next = Next {
                        chain: self.chain,
                        position: index + 1,
                    };
                    (capability, next)
                })
            })
    }

    fn missing(&self, capability: Capability) -> ViewModelError {
        ViewModelError::MissingCapability {
            capability,
            subject: self.chain.subject.to_string(),
        }
    }

    /// Continue `get_value`
    ///
    /// # Errors
    /// [`ViewModelError::MissingCapability`] when no accessor remains.
    pub fn get_value(self, ctx: &ReadContext<'_>) -> Result<FieldValue, ViewModelError> {
        match self.locate(|b| b.value_access()) {
            Some((accessor, next)) => accessor.get_value(ctx, next),
            None => Err(self.missing(Capability::ValueAccess)),
        }
    }

    /// Continue `set_value`
    ///
    /// # Errors
    /// [`ViewModelError::MissingCapability`] when no accessor remains.
    pub fn set_value(
        self,
        ctx: &mut BehaviorContext<'_>,
        value: FieldValue,
    ) -> Result<(), ViewModelError> {
        match self.locate(|b| b.value_access()) {
            Some((accessor, next)) => accessor.set_value(ctx, next, value),
            None => Err(self.missing(Capability::ValueAccess)),
        }
    }

    /// Continue `get_validated_value`
    ///
    /// # Errors
    /// [`ViewModelError::MissingCapability`] when no accessor remains.
    pub fn get_validated_value(self, ctx: &ReadContext<'_>) -> Result<FieldValue, ViewModelError> {
        match self.locate(|b| b.value_access()) {
            Some((accessor, next)) => accessor.get_validated_value(ctx, next),
            None => Err(self.missing(Capability::ValueAccess)),
        }
    }

    /// Continue `validate`; valid when no validator remains
    ///
    /// # Errors
    /// Configuration defects raised downstream.
    pub fn validate(
        self,
        ctx: &ReadContext<'_>,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, ViewModelError> {
        match self.locate(|b| b.validation()) {
            Some((validator, next)) => validator.validate(ctx, next, request),
            None => Ok(ValidationResult::valid()),
        }
    }

    /// Continue `handle_change`; no-op when no handler remains
    ///
    /// # Errors
    /// Errors raised downstream.
    pub fn handle_change(
        self,
        ctx: &mut BehaviorContext<'_>,
        args: &ChangeArgs,
    ) -> Result<(), ViewModelError> {
        match self.locate(|b| b.change_handler()) {
            Some((handler, next)) => handler.handle_change(ctx, next, args),
            None => Ok(()),
        }
    }

    /// Continue `refresh`; no-op when no refresher remains
    ///
    /// # Errors
    /// Errors raised downstream.
    pub fn refresh(
        self,
        ctx: &mut BehaviorContext<'_>,
        options: RefreshOptions,
    ) -> Result<(), ViewModelError> {
        match self.locate(|b| b.refresher()) {
            Some((refresher, next)) => refresher.refresh(ctx, next, options),
            None => Ok(()),
        }
    }
}

impl Debug for Next<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("subject", &self.chain.subject)
            .field("position", &self.position)
            .finish()
    }
}
