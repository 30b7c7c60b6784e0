//! The code host: the collaborator that owns a module and materializes types.
//!
//! The synthesis engine never builds a [`crate::runtime::CompiledType`] itself. It asks a
//! [`CodeHost`] for a fresh [`TypeBuilder`], defines every member on it and finally seals it.
//! The host decides how members execute; the bodies it receives are closures produced by the
//! accessor code generator, so an interpreting host only has to keep them in tables.
//!
//! # Protocol
//!
//! 1. [`CodeHost::initialize`] once before the first type is defined (idempotent)
//! 2. [`CodeHost::define_type`] per type descriptor
//! 3. `define_*`, [`TypeBuilder::add_capability`], [`TypeBuilder::set_attribute`]
//! 4. [`TypeBuilder::seal`], which checks that every capability member is implemented and
//!    returns the immutable compiled type
//!
//! A builder that is dropped without sealing leaves nothing behind in the module.
//!
//! # Default Host
//!
//! [`DefaultHost`] interprets types as tables of closures keyed by member token. Sealed types
//! live in a skip list keyed by type token, the same way a metadata registry keeps its types.

mod builder;
mod default;

pub use builder::DefaultTypeBuilder;
pub use default::DefaultHost;

use std::sync::Arc;

use crate::{
    codegen::{GetterBody, MethodBody, SetterBody, StaticBody},
    descriptor::{AttributeInstance, FieldAttributes, Literal, MethodAttributes, ParameterDescriptor},
    runtime::{CompiledTypeRc, ConstructorHandle, FieldHandle, MemberRef, MethodHandle, PropertyHandle},
    token::Token,
    typesystem::{CapabilityRc, TypeSig, Value},
    Result,
};

/// Shape of a field to define.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Storage type
    pub ty: TypeSig,
    /// Visibility and storage flags
    pub flags: FieldAttributes,
    /// Embedded metadata
    pub attributes: Vec<AttributeInstance>,
}

/// Shape and accessors of a property to define.
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Value type
    pub ty: TypeSig,
    /// Index parameter types, empty for plain properties
    pub index: Vec<TypeSig>,
    /// Getter body, if readable
    pub getter: Option<GetterBody>,
    /// Setter body, if writable
    pub setter: Option<SetterBody>,
    /// Capability members satisfied explicitly
    pub overrides: Vec<MemberRef>,
    /// Embedded metadata
    pub attributes: Vec<AttributeInstance>,
}

/// Signature and body of a method to define.
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Return type
    pub return_type: TypeSig,
    /// Parameters
    pub params: Vec<ParameterDescriptor>,
    /// Flags
    pub flags: MethodAttributes,
    /// Body
    pub body: MethodBody,
    /// Capability members satisfied explicitly
    pub overrides: Vec<MemberRef>,
    /// Embedded metadata
    pub attributes: Vec<AttributeInstance>,
}

/// Parameters and body of an instance constructor to define.
pub struct ConstructorDef {
    /// Parameters
    pub params: Vec<ParameterDescriptor>,
    /// Body, if the constructor does anything
    pub body: Option<MethodBody>,
}

/// Owns a module and hands out type builders.
pub trait CodeHost: Send + Sync {
    /// Prepares the module. Calling it more than once has no further effect.
    ///
    /// # Errors
    /// Host-specific.
    fn initialize(&self) -> Result<()>;

    /// Starts a new type named `name`, deriving from `base` if given.
    ///
    /// # Errors
    /// Host-specific, e.g. when the host was not initialized.
    fn define_type(&self, name: &str, base: Option<CompiledTypeRc>) -> Result<Box<dyn TypeBuilder>>;
}

/// A type under construction.
///
/// Lookups (`field`, `property`, `method`) see members defined so far, own ones first, then
/// those of the base chain.
pub trait TypeBuilder: Send {
    /// Name of the type under construction.
    fn name(&self) -> &str;

    /// Base type, if any.
    fn base(&self) -> Option<&CompiledTypeRc>;

    /// Defines a field.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if this type already declares a field of
    /// that name.
    fn define_field(&mut self, def: FieldDef) -> Result<FieldHandle>;

    /// Looks up a field defined so far.
    fn field(&self, name: &str) -> Option<FieldHandle>;

    /// Defines a property.
    ///
    /// # Errors
    /// Host-specific.
    fn define_property(&mut self, def: PropertyDef) -> Result<Arc<PropertyHandle>>;

    /// Looks up a property defined so far.
    fn property(&self, name: &str) -> Option<Arc<PropertyHandle>>;

    /// Defines a method.
    ///
    /// # Errors
    /// Host-specific.
    fn define_method(&mut self, def: MethodDef) -> Result<Arc<MethodHandle>>;

    /// Looks up a method defined so far.
    fn method(&self, name: &str) -> Option<Arc<MethodHandle>>;

    /// Defines an instance constructor.
    ///
    /// # Errors
    /// Host-specific.
    fn define_constructor(&mut self, def: ConstructorDef) -> Result<Arc<ConstructorHandle>>;

    /// Sets the static initializer.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if one is already set.
    fn set_static_initializer(&mut self, body: StaticBody) -> Result<Token>;

    /// Sets the finalizer.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if one is already set.
    fn set_finalizer(&mut self, body: MethodBody) -> Result<Token>;

    /// Declares that the type implements `capability`.
    fn add_capability(&mut self, capability: CapabilityRc);

    /// Attaches type-level metadata.
    fn set_attribute(&mut self, attribute: AttributeInstance);

    /// Converts a literal into an embeddable constant.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedLiteral`] for literals the host cannot embed.
    fn embed_literal(&self, literal: &Literal) -> Result<Value>;

    /// Seals the type.
    ///
    /// # Errors
    /// Returns [`crate::Error::MissingMember`] if a capability member is not implemented and
    /// [`crate::Error::AmbiguousDescriptor`] if several members claim it.
    fn seal(self: Box<Self>) -> Result<CompiledTypeRc>;
}
