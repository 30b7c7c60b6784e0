//! Accessor body generation.
//!
//! The default code host executes members as closures. A member body is produced in two steps:
//!
//! 1. While a member is being defined, a *generator* runs against an [`EmitScope`]. The
//!    generator resolves everything it needs from the type under construction (backing field
//!    handles, sibling methods, base accessors) and fails with [`crate::Error::MissingMember`]
//!    if something is absent. Failures therefore surface at synthesis time, never at call time.
//! 2. The generator returns the *body*, a closure capturing the resolved handles. Bodies run
//!    against an [`crate::runtime::Instance`] every time the member is used.
//!
//! The default strategies live in the submodules:
//!
//! - [`accessor`] - field-backed and base-delegating property accessors
//! - [`detour`] - forwarding to a wrapped target, with optional result wrapping
//! - [`dispose`] - the disposal state machine and the finalizer fallback
//!
//! Indexers have no default strategy; their owner always supplies the bodies.

pub mod accessor;
pub mod detour;
pub mod dispose;

use std::sync::Arc;

use crate::{
    config::SynthesisConfig,
    host::TypeBuilder,
    runtime::{CompiledType, FieldHandle, Instance, MethodHandle, PropertyHandle},
    typesystem::Value,
    Error, Result,
};

/// Body of a property getter: `(instance, index) -> value`.
pub type GetterBody = Arc<dyn Fn(&Instance, &[Value]) -> Result<Value> + Send + Sync>;

/// Body of a property setter: `(instance, index, value)`.
pub type SetterBody = Arc<dyn Fn(&Instance, &[Value], Value) -> Result<()> + Send + Sync>;

/// Body of a method or instance constructor: `(instance, arguments) -> result`.
pub type MethodBody = Arc<dyn Fn(&Instance, &[Value]) -> Result<Value> + Send + Sync>;

/// Body of a static initializer.
pub type StaticBody = Arc<dyn Fn(&CompiledType) -> Result<()> + Send + Sync>;

/// Result transform applied by forwarding members, e.g. building a proxy for a nested object.
pub type WrapFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Disposal hook: `(instance, wrapped target)`.
pub type DisposeHook = Arc<dyn Fn(&Instance, &Value) -> Result<()> + Send + Sync>;

/// Generator of a getter body.
pub type GetterGen = Arc<dyn Fn(&EmitScope<'_>) -> Result<GetterBody> + Send + Sync>;

/// Generator of a setter body.
pub type SetterGen = Arc<dyn Fn(&EmitScope<'_>) -> Result<SetterBody> + Send + Sync>;

/// Generator of a method or constructor body.
pub type MethodGen = Arc<dyn Fn(&EmitScope<'_>) -> Result<MethodBody> + Send + Sync>;

/// Wraps a ready-made getter body into a generator.
#[must_use]
pub fn getter_gen(body: GetterBody) -> GetterGen {
    Arc::new(move |_| Ok(body.clone()))
}

/// Wraps a ready-made setter body into a generator.
#[must_use]
pub fn setter_gen(body: SetterBody) -> SetterGen {
    Arc::new(move |_| Ok(body.clone()))
}

/// Wraps a ready-made method body into a generator.
#[must_use]
pub fn method_gen(body: MethodBody) -> MethodGen {
    Arc::new(move |_| Ok(body.clone()))
}

/// The view of the type under construction a generator resolves against.
pub struct EmitScope<'a> {
    builder: &'a dyn TypeBuilder,
    member: &'a str,
    config: &'a SynthesisConfig,
}

impl<'a> EmitScope<'a> {
    pub(crate) fn new(
        builder: &'a dyn TypeBuilder,
        member: &'a str,
        config: &'a SynthesisConfig,
    ) -> Self {
        EmitScope {
            builder,
            member,
            config,
        }
    }

    /// Name of the type under construction.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.builder.name()
    }

    /// Name of the member whose body is being generated.
    #[must_use]
    pub fn member(&self) -> &str {
        self.member
    }

    /// The active synthesis configuration.
    #[must_use]
    pub fn config(&self) -> &SynthesisConfig {
        self.config
    }

    /// Resolves an already defined field, own or inherited.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the field has not been defined.
    pub fn field(&self, name: &str) -> Result<FieldHandle> {
        self.builder
            .field(name)
            .ok_or_else(|| Error::missing(self.builder.name(), name))
    }

    /// Resolves an already defined property, own or inherited.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the property has not been defined.
    pub fn property(&self, name: &str) -> Result<Arc<PropertyHandle>> {
        self.builder
            .property(name)
            .ok_or_else(|| Error::missing(self.builder.name(), name))
    }

    /// Resolves an already defined method, own or inherited.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the method has not been defined.
    pub fn method(&self, name: &str) -> Result<Arc<MethodHandle>> {
        self.builder
            .method(name)
            .ok_or_else(|| Error::missing(self.builder.name(), name))
    }

    /// Resolves a property of the base type.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if there is no base type or it lacks the property.
    pub fn base_property(&self, name: &str) -> Result<Arc<PropertyHandle>> {
        self.builder
            .base()
            .and_then(|base| base.property(name).cloned())
            .ok_or_else(|| Error::missing(format!("{}::base", self.builder.name()), name))
    }
}
