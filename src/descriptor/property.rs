use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{
    codegen::{getter_gen, setter_gen, GetterBody, GetterGen, SetterBody, SetterGen},
    config::SynthesisConfig,
    descriptor::{AttributeDescriptor, Dependency, FieldMember, OverrideTarget},
    runtime::{Instance, PropertyHandle},
    token::Token,
    typesystem::{CapabilityRc, TypeSig, Value},
    Error, Result,
};

/// Where a property keeps its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyStorage {
    /// A backing field named by the engine
    Implicit,
    /// The named backing field, reused if a field of that name exists
    Field(String),
    /// No storage; accessors come from body strategies or the base type
    Custom,
}

/// How implicit backing fields of capability properties are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackingMode {
    /// `m_<Name>`: properties of the same name share one field
    #[default]
    Shared,
    /// `<Capability>_<Name>`: one field per implemented capability
    PerCapability,
}

/// A property: value type, optional index parameters and get/set strategies.
///
/// Without custom strategies a property is backed by a field. The field is created by the
/// engine unless a field of the backing name already exists, in which case it is reused.
/// Indexers never use implicit storage; their owner supplies both accessors.
///
/// # Examples
///
/// ```rust
/// use typeforge::{descriptor::PropertyMember, typesystem::{CapabilityBuilder, TypeSig}};
///
/// let named = CapabilityBuilder::new("INamed").property("Name", TypeSig::String).build();
///
/// let plain = PropertyMember::new("Count", TypeSig::I4);
/// let implemented = PropertyMember::from_capability(&named, "Name")?;
/// assert!(plain.needs_backing());
/// assert_eq!(implemented.overrides().len(), 1);
///
/// // Indexers cannot ask for implicit storage.
/// let indexer = PropertyMember::indexer("Item", TypeSig::Object, vec![TypeSig::String]);
/// assert!(indexer.with_backing_field("m_Item").is_err());
/// # Ok::<(), typeforge::Error>(())
/// ```
pub struct PropertyMember {
    name: String,
    ty: TypeSig,
    index: Vec<TypeSig>,
    get: bool,
    set: bool,
    storage: PropertyStorage,
    storage_requested: bool,
    backing_mode: BackingMode,
    pub(crate) getter: Option<GetterGen>,
    pub(crate) setter: Option<SetterGen>,
    pub(crate) overrides: Vec<OverrideTarget>,
    pub(crate) attributes: Vec<AttributeDescriptor>,
    pub(crate) backing_field: Option<String>,
    pub(crate) defined: bool,
    pub(crate) token: Option<Token>,
    pub(crate) bound: OnceLock<Arc<PropertyHandle>>,
}

impl PropertyMember {
    /// A read/write property backed by an implicit field.
    pub fn new(name: impl Into<String>, ty: TypeSig) -> Self {
        PropertyMember {
            name: name.into(),
            ty,
            index: Vec::new(),
            get: true,
            set: true,
            storage: PropertyStorage::Implicit,
            storage_requested: false,
            backing_mode: BackingMode::default(),
            getter: None,
            setter: None,
            overrides: Vec::new(),
            attributes: Vec::new(),
            backing_field: None,
            defined: false,
            token: None,
            bound: OnceLock::new(),
        }
    }

    /// A read/write indexer without storage; supply both accessors.
    pub fn indexer(name: impl Into<String>, ty: TypeSig, index: Vec<TypeSig>) -> Self {
        let mut property = Self::new(name, ty);
        property.index = index;
        property.storage = PropertyStorage::Custom;
        property
    }

    /// A property implementing the same-named property of `capability`.
    ///
    /// Type, index parameters and accessor flags are copied from the capability.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the capability has no such property and
    /// [`Error::AmbiguousDescriptor`] if several inherited capabilities declare one.
    pub fn from_capability(capability: &CapabilityRc, name: &str) -> Result<Self> {
        let (_, sig) = capability.resolve_property(name, None)?;
        let mut property = if sig.is_indexer() {
            Self::indexer(sig.name, sig.ty, sig.index)
        } else {
            Self::new(sig.name, sig.ty)
        };
        property.get = sig.get;
        property.set = sig.set;
        property.overrides.push(OverrideTarget::Capability(capability.clone()));
        Ok(property)
    }

    /// One property implementing the same-named property of several capabilities.
    ///
    /// The property is backed by a single shared field.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] or [`Error::AmbiguousDescriptor`] if a capability does
    /// not resolve the property, [`Error::InvalidDescriptor`] if the capabilities disagree on
    /// its type or the list is empty.
    pub fn from_capabilities(capabilities: &[CapabilityRc], name: &str) -> Result<Self> {
        let (first, rest) = capabilities.split_first().ok_or_else(|| {
            Error::InvalidDescriptor(format!("property '{name}' implements no capability"))
        })?;

        let mut property = Self::from_capability(first, name)?;
        for capability in rest {
            let (_, sig) = capability.resolve_property(name, None)?;
            if sig.ty != property.ty || sig.index != property.index {
                return Err(Error::InvalidDescriptor(format!(
                    "property '{name}' is declared as {} by '{}' but as {} by '{}'",
                    property.ty,
                    first.name(),
                    sig.ty,
                    capability.name()
                )));
            }
            property.get |= sig.get;
            property.set |= sig.set;
            property
                .overrides
                .push(OverrideTarget::Capability(capability.clone()));
        }
        property.backing_mode = BackingMode::Shared;
        Ok(property)
    }

    /// Turns the property into an indexer.
    ///
    /// Implicit storage is dropped, the accessors have to be supplied.
    ///
    /// # Errors
    /// Returns [`Error::IndexedMemberConflict`] if a backing field, named or implicit, was
    /// requested explicitly.
    pub fn with_index(mut self, index: Vec<TypeSig>) -> Result<Self> {
        if index.is_empty() {
            self.index = index;
            return Ok(self);
        }
        if self.storage_requested && self.storage != PropertyStorage::Custom {
            return Err(Error::IndexedMemberConflict(self.name));
        }
        self.index = index;
        self.storage = PropertyStorage::Custom;
        Ok(self)
    }

    /// Backs the property with the named field, reusing it if it already exists.
    ///
    /// # Errors
    /// Returns [`Error::IndexedMemberConflict`] for indexers.
    pub fn with_backing_field(mut self, name: impl Into<String>) -> Result<Self> {
        if self.is_indexer() {
            return Err(Error::IndexedMemberConflict(self.name));
        }
        self.storage = PropertyStorage::Field(name.into());
        self.storage_requested = true;
        Ok(self)
    }

    /// Requests an implicit backing field.
    ///
    /// # Errors
    /// Returns [`Error::IndexedMemberConflict`] for indexers.
    pub fn with_implicit_backing(mut self) -> Result<Self> {
        if self.is_indexer() {
            return Err(Error::IndexedMemberConflict(self.name));
        }
        self.storage = PropertyStorage::Implicit;
        self.storage_requested = true;
        Ok(self)
    }

    /// Drops storage. Accessors must then come from strategies or a base override.
    #[must_use]
    pub fn without_storage(mut self) -> Self {
        self.storage = PropertyStorage::Custom;
        self.storage_requested = false;
        self
    }

    /// Chooses how the implicit backing field is named.
    #[must_use]
    pub fn with_backing_mode(mut self, mode: BackingMode) -> Self {
        self.backing_mode = mode;
        self
    }

    /// Enables or disables the accessors.
    #[must_use]
    pub fn with_access(mut self, get: bool, set: bool) -> Self {
        self.get = get;
        self.set = set;
        self
    }

    /// Makes the property get-only.
    #[must_use]
    pub fn read_only(self) -> Self {
        self.with_access(true, false)
    }

    /// Supplies the getter strategy.
    #[must_use]
    pub fn with_getter(mut self, getter: GetterGen) -> Self {
        self.getter = Some(getter);
        self.get = true;
        self
    }

    /// Supplies the setter strategy.
    #[must_use]
    pub fn with_setter(mut self, setter: SetterGen) -> Self {
        self.setter = Some(setter);
        self.set = true;
        self
    }

    /// Supplies a ready-made getter body.
    #[must_use]
    pub fn with_getter_body(self, body: GetterBody) -> Self {
        self.with_getter(getter_gen(body))
    }

    /// Supplies a ready-made setter body.
    #[must_use]
    pub fn with_setter_body(self, body: SetterBody) -> Self {
        self.with_setter(setter_gen(body))
    }

    /// Declares that the property satisfies the same-named member of `target`.
    #[must_use]
    pub fn overriding(mut self, target: OverrideTarget) -> Self {
        self.overrides.push(target);
        self
    }

    /// Attaches a metadata tag.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value type.
    #[must_use]
    pub fn ty(&self) -> &TypeSig {
        &self.ty
    }

    /// Index parameter types.
    #[must_use]
    pub fn index(&self) -> &[TypeSig] {
        &self.index
    }

    /// Returns `true` for indexers.
    #[must_use]
    pub fn is_indexer(&self) -> bool {
        !self.index.is_empty()
    }

    /// Returns `true` if the getter is enabled.
    #[must_use]
    pub fn can_read(&self) -> bool {
        self.get
    }

    /// Returns `true` if the setter is enabled.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.set
    }

    /// Storage mode.
    #[must_use]
    pub fn storage(&self) -> &PropertyStorage {
        &self.storage
    }

    /// Override targets.
    #[must_use]
    pub fn overrides(&self) -> &[OverrideTarget] {
        &self.overrides
    }

    /// Metadata tags.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Returns `true` if an enabled accessor lacks a strategy and storage is available.
    ///
    /// Base overrides delegate missing accessors to the base property instead.
    #[must_use]
    pub fn needs_backing(&self) -> bool {
        self.storage != PropertyStorage::Custom
            && !self.overrides_base()
            && ((self.get && self.getter.is_none()) || (self.set && self.setter.is_none()))
    }

    /// Returns `true` if the property overrides the same-named base property.
    #[must_use]
    pub fn overrides_base(&self) -> bool {
        self.overrides
            .iter()
            .any(|target| matches!(target, OverrideTarget::Base))
    }

    /// The resolved backing field name (available once synthesis prepared the member).
    #[must_use]
    pub fn backing_field(&self) -> Option<&str> {
        self.backing_field.as_deref()
    }

    /// Computes the backing field name for `config`.
    #[must_use]
    pub fn backing_name(&self, config: &SynthesisConfig) -> Option<String> {
        if !self.needs_backing() {
            return None;
        }
        match &self.storage {
            PropertyStorage::Field(name) => Some(name.clone()),
            PropertyStorage::Implicit => {
                let capability = self.overrides.iter().find_map(|target| match target {
                    OverrideTarget::Capability(capability) => Some(capability),
                    OverrideTarget::Base => None,
                });
                Some(match (self.backing_mode, capability) {
                    (BackingMode::PerCapability, Some(capability)) => {
                        format!("{}_{}", capability.short_name(), self.name)
                    }
                    _ => format!("{}{}", config.backing_field_prefix, self.name),
                })
            }
            PropertyStorage::Custom => None,
        }
    }

    pub(crate) fn prepare(&mut self, config: &SynthesisConfig) -> Option<FieldMember> {
        self.backing_field = self.backing_name(config);
        self.backing_field
            .as_ref()
            .map(|name| FieldMember::generated(name.clone(), self.ty.clone()))
    }

    pub(crate) fn dependencies(&self) -> Vec<Dependency> {
        self.backing_field
            .iter()
            .map(|name| Dependency::Field(name.clone()))
            .collect()
    }

    /// The compiled handle, once bound.
    #[must_use]
    pub fn handle(&self) -> Option<&Arc<PropertyHandle>> {
        self.bound.get()
    }

    fn bound(&self) -> Result<&Arc<PropertyHandle>> {
        self.bound
            .get()
            .ok_or_else(|| Error::InvalidDescriptor(format!("property '{}' is not bound", self.name)))
    }

    /// Reads the property of `instance` through the bound handle.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] before the owning type is compiled, or whatever the
    /// getter raises.
    pub fn get_value(&self, instance: &Instance) -> Result<Value> {
        self.bound()?.get(instance, &[])
    }

    /// Writes the property of `instance` through the bound handle.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] before the owning type is compiled, or whatever the
    /// setter raises.
    pub fn set_value(&self, instance: &Instance, value: impl Into<Value>) -> Result<()> {
        self.bound()?.set(instance, &[], value.into())
    }

    /// Reads an indexer of `instance` through the bound handle.
    ///
    /// # Errors
    /// As [`Self::get_value`].
    pub fn get_indexed(&self, instance: &Instance, index: &[Value]) -> Result<Value> {
        self.bound()?.get(instance, index)
    }

    /// Writes an indexer of `instance` through the bound handle.
    ///
    /// # Errors
    /// As [`Self::set_value`].
    pub fn set_indexed(&self, instance: &Instance, index: &[Value], value: impl Into<Value>) -> Result<()> {
        self.bound()?.set(instance, index, value.into())
    }
}

impl fmt::Debug for PropertyMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMember")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("index", &self.index)
            .field("get", &self.get)
            .field("set", &self.set)
            .field("storage", &self.storage)
            .field("backing_field", &self.backing_field)
            .field("overrides", &self.overrides.len())
            .field("defined", &self.defined)
            .finish_non_exhaustive()
    }
}
