use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use tracing::trace;

use crate::{
    codegen::{MethodBody, StaticBody},
    descriptor::AttributeInstance,
    runtime::{
        ConstructorHandle, FieldHandle, Instance, InstanceRc, MethodHandle, PropertyHandle,
        StaticSlots,
    },
    token::Token,
    typesystem::{CapabilityRc, Value},
    Error, Result,
};

/// Reference-counted compiled type.
pub type CompiledTypeRc = Arc<CompiledType>;

/// The implementation a capability member dispatches to.
#[derive(Clone, Debug)]
pub enum Dispatch {
    /// A property implementation
    Property(Arc<PropertyHandle>),
    /// A method implementation
    Method(Arc<MethodHandle>),
    /// Implementations of an overloaded method, in capability declaration order
    Overloads(Vec<Arc<MethodHandle>>),
}

impl Dispatch {
    /// Method implementations of this entry; empty for properties.
    #[must_use]
    pub fn methods(&self) -> &[Arc<MethodHandle>] {
        match self {
            Dispatch::Method(method) => std::slice::from_ref(method),
            Dispatch::Overloads(methods) => methods,
            Dispatch::Property(_) => &[],
        }
    }

    /// The method implementation to call with `args`.
    ///
    /// A single implementation is returned as is, so argument errors surface from the call.
    #[must_use]
    pub fn method_for(&self, args: &[Value]) -> Option<&Arc<MethodHandle>> {
        match self {
            Dispatch::Method(method) => Some(method),
            Dispatch::Overloads(methods) => methods.iter().find(|m| m.accepts(args)),
            Dispatch::Property(_) => None,
        }
    }

    pub(crate) fn push_overload(&mut self, method: Arc<MethodHandle>) {
        match self {
            Dispatch::Overloads(methods) => methods.push(method),
            Dispatch::Method(first) => {
                let first = first.clone();
                *self = Dispatch::Overloads(vec![first, method]);
            }
            Dispatch::Property(_) => *self = Dispatch::Method(method),
        }
    }
}

/// A sealed, instantiable type produced by a code host.
///
/// A compiled type never changes after sealing. Inherited members are not copied: lookups walk
/// the base chain, and the instance layout places the base slots first.
pub struct CompiledType {
    pub(crate) token: Token,
    pub(crate) name: String,
    pub(crate) base: Option<CompiledTypeRc>,
    pub(crate) capabilities: Vec<CapabilityRc>,
    pub(crate) attributes: Vec<AttributeInstance>,
    pub(crate) fields: Vec<FieldHandle>,
    pub(crate) slot_count: usize,
    pub(crate) properties: Vec<Arc<PropertyHandle>>,
    pub(crate) methods: Vec<Arc<MethodHandle>>,
    pub(crate) constructors: Vec<Arc<ConstructorHandle>>,
    pub(crate) static_init: Option<StaticBody>,
    pub(crate) static_state: OnceLock<std::result::Result<(), String>>,
    pub(crate) statics: StaticSlots,
    pub(crate) finalizer: Option<MethodBody>,
    pub(crate) dispatch: HashMap<(String, String), Dispatch>,
}

impl CompiledType {
    /// Token assigned by the code host.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base type, if any.
    #[must_use]
    pub fn base(&self) -> Option<&CompiledTypeRc> {
        self.base.as_ref()
    }

    /// Every implemented capability, including inherited ones and those of the base type.
    #[must_use]
    pub fn capabilities(&self) -> &[CapabilityRc] {
        &self.capabilities
    }

    /// Type-level metadata.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeInstance] {
        &self.attributes
    }

    /// Looks up a type-level attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeInstance> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Fields declared by this type (not inherited ones).
    #[must_use]
    pub fn fields(&self) -> &[FieldHandle] {
        &self.fields
    }

    /// Number of instance slots, inherited ones included.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Properties declared by this type.
    #[must_use]
    pub fn properties(&self) -> &[Arc<PropertyHandle>] {
        &self.properties
    }

    /// Methods declared by this type.
    #[must_use]
    pub fn methods(&self) -> &[Arc<MethodHandle>] {
        &self.methods
    }

    /// Instance constructors declared by this type.
    #[must_use]
    pub fn constructors(&self) -> &[Arc<ConstructorHandle>] {
        &self.constructors
    }

    /// Returns `true` if the type has a finalizer.
    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.finalizer.is_some()
    }

    pub(crate) fn finalizer(&self) -> Option<&MethodBody> {
        self.finalizer.as_ref()
    }

    /// Walks this type and its base chain, most derived first.
    pub fn hierarchy(&self) -> impl Iterator<Item = &CompiledType> {
        std::iter::successors(Some(self), |ty| ty.base.as_deref())
    }

    /// Instance layout: every instance field, base slots first.
    #[must_use]
    pub fn layout(&self) -> Vec<FieldHandle> {
        let mut levels: Vec<&CompiledType> = self.hierarchy().collect();
        levels.reverse();
        levels
            .into_iter()
            .flat_map(|ty| ty.fields.iter())
            .filter(|field| !field.is_static())
            .cloned()
            .collect()
    }

    /// Looks up a field by name, most derived declaration first.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldHandle> {
        self.hierarchy()
            .find_map(|ty| ty.fields.iter().rev().find(|f| f.name == name))
    }

    /// Looks up a property by name, most derived declaration first.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyHandle>> {
        self.hierarchy()
            .find_map(|ty| ty.properties.iter().find(|p| p.name == name))
    }

    /// Looks up a method by name, most derived declaration first.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Arc<MethodHandle>> {
        self.hierarchy()
            .find_map(|ty| ty.methods.iter().find(|m| m.name == name))
    }

    /// Finds the first method named `name` whose parameters accept `args`.
    #[must_use]
    pub fn find_method(&self, name: &str, args: &[Value]) -> Option<&Arc<MethodHandle>> {
        self.hierarchy().find_map(|ty| {
            ty.methods
                .iter()
                .find(|m| m.name == name && m.accepts(args))
        })
    }

    /// Resolves a field of this type by token.
    #[must_use]
    pub fn field_by_token(&self, token: Token) -> Option<&FieldHandle> {
        self.fields.iter().find(|f| f.token == token)
    }

    /// Resolves a property of this type by token.
    #[must_use]
    pub fn property_by_token(&self, token: Token) -> Option<&Arc<PropertyHandle>> {
        self.properties.iter().find(|p| p.token == token)
    }

    /// Resolves a method of this type by token.
    #[must_use]
    pub fn method_by_token(&self, token: Token) -> Option<&Arc<MethodHandle>> {
        self.methods.iter().find(|m| m.token == token)
    }

    /// Resolves a constructor of this type by token.
    #[must_use]
    pub fn constructor_by_token(&self, token: Token) -> Option<&Arc<ConstructorHandle>> {
        self.constructors.iter().find(|c| c.token == token)
    }

    /// The implementation of `member` of `capability`, if this type implements it.
    #[must_use]
    pub fn dispatch(&self, capability: &str, member: &str) -> Option<&Dispatch> {
        self.dispatch
            .get(&(capability.to_string(), member.to_string()))
    }

    /// Returns `true` if the type implements the named capability.
    #[must_use]
    pub fn implements(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c.name() == capability)
    }

    /// Returns `true` if instances of this type may be stored in a slot of type `other`.
    #[must_use]
    pub fn is_assignable_to(&self, other: &CompiledType) -> bool {
        self.hierarchy().any(|ty| ty.token == other.token)
    }

    /// Reads a static field.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if no such static field exists.
    pub fn static_field(&self, name: &str) -> Result<Value> {
        match self.field(name) {
            Some(field) if field.is_static() => field.get_static(),
            _ => Err(Error::missing(&self.name, name)),
        }
    }

    /// Writes a static field.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if no such static field exists,
    /// [`Error::TypeMismatch`] if the value does not fit.
    pub fn set_static_field(&self, name: &str, value: Value) -> Result<()> {
        match self.field(name) {
            Some(field) if field.is_static() => field.set_static(value),
            _ => Err(Error::missing(&self.name, name)),
        }
    }

    /// Runs the static initializers of the base chain and this type, once.
    ///
    /// # Errors
    /// Returns [`Error::Error`] if a static initializer failed, now or on an earlier call.
    pub fn ensure_initialized(&self) -> Result<()> {
        if let Some(base) = &self.base {
            base.ensure_initialized()?;
        }

        let state = self.static_state.get_or_init(|| match &self.static_init {
            Some(init) => {
                trace!(ty = %self.name, "running static initializer");
                init(self).map_err(|error| error.to_string())
            }
            None => Ok(()),
        });

        state.clone().map_err(|message| {
            Error::Error(format!(
                "static initializer of '{}' failed - {message}",
                self.name
            ))
        })
    }

    /// Creates a new instance.
    ///
    /// Slots are initialised with the default value of their field type, then the first
    /// constructor accepting `args` runs (trailing arguments may come from parameter
    /// defaults). A type without declared constructors has an implicit parameterless one.
    /// The parameterless constructor of the direct base type, if it declares one, runs first.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentCount`] if no constructor accepts `args`, or whatever the
    /// static initializer or the constructor body raises.
    pub fn create_instance(self: &Arc<Self>, args: &[Value]) -> Result<InstanceRc> {
        self.ensure_initialized()?;

        let slots = self
            .layout()
            .iter()
            .map(|field| field.ty.default_value())
            .collect();
        let instance = Arc::new(Instance::new(self.clone(), slots));

        if let Some(base) = &self.base {
            if let Some(base_ctor) = base.constructors.iter().find(|c| c.params.is_empty()) {
                base_ctor.run(&instance, &[])?;
            }
        }

        if self.constructors.is_empty() {
            if !args.is_empty() {
                return Err(Error::ArgumentCount {
                    member: format!("{}..ctor", self.name),
                    expected: 0,
                    found: args.len(),
                });
            }
        } else {
            let constructor = self
                .constructors
                .iter()
                .find(|c| c.accepts(args))
                .ok_or_else(|| Error::ArgumentCount {
                    member: format!("{}..ctor", self.name),
                    expected: self.constructors.first().map_or(0, |c| c.params.len()),
                    found: args.len(),
                })?;
            constructor.run(&instance, args)?;
        }

        Ok(instance)
    }
}

impl fmt::Debug for CompiledType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledType")
            .field("token", &self.token)
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|b| b.name.clone()))
            .field(
                "capabilities",
                &self
                    .capabilities
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("fields", &self.fields.len())
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .finish_non_exhaustive()
    }
}
