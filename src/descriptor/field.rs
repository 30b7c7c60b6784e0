use std::sync::OnceLock;

use crate::{
    descriptor::{AttributeDescriptor, FieldAttributes},
    runtime::{FieldHandle, Instance},
    token::Token,
    typesystem::{TypeSig, Value},
    Error, Result,
};

/// A storage slot.
#[derive(Debug)]
pub struct FieldMember {
    name: String,
    ty: TypeSig,
    flags: FieldAttributes,
    pub(crate) attributes: Vec<AttributeDescriptor>,
    pub(crate) defined: bool,
    pub(crate) token: Option<Token>,
    pub(crate) bound: OnceLock<FieldHandle>,
}

impl FieldMember {
    /// A private instance field.
    pub fn new(name: impl Into<String>, ty: TypeSig) -> Self {
        FieldMember {
            name: name.into(),
            ty,
            flags: FieldAttributes::default(),
            attributes: Vec::new(),
            defined: false,
            token: None,
            bound: OnceLock::new(),
        }
    }

    /// A private field generated for another member.
    pub(crate) fn generated(name: impl Into<String>, ty: TypeSig) -> Self {
        Self::new(name, ty).with_flags(FieldAttributes::PRIVATE | FieldAttributes::COMPILER_GENERATED)
    }

    /// Replaces the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: FieldAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Makes the field public.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.flags.remove(FieldAttributes::PRIVATE);
        self.flags.insert(FieldAttributes::PUBLIC);
        self
    }

    /// Makes the field static.
    #[must_use]
    pub fn static_field(mut self) -> Self {
        self.flags.insert(FieldAttributes::STATIC);
        self
    }

    /// Attaches a metadata tag.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage type.
    #[must_use]
    pub fn ty(&self) -> &TypeSig {
        &self.ty
    }

    /// Field flags.
    #[must_use]
    pub fn flags(&self) -> FieldAttributes {
        self.flags
    }

    /// The compiled handle, once bound.
    #[must_use]
    pub fn handle(&self) -> Option<&FieldHandle> {
        self.bound.get()
    }

    fn bound(&self) -> Result<&FieldHandle> {
        self.bound
            .get()
            .ok_or_else(|| Error::InvalidDescriptor(format!("field '{}' is not bound", self.name)))
    }

    /// Reads the field of `instance` through the bound handle.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] before the owning type is compiled.
    pub fn get_value(&self, instance: &Instance) -> Result<Value> {
        self.bound()?.get(instance)
    }

    /// Writes the field of `instance` through the bound handle.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] before the owning type is compiled,
    /// [`Error::TypeMismatch`] if the value does not fit.
    pub fn set_value(&self, instance: &Instance, value: impl Into<Value>) -> Result<()> {
        self.bound()?.set(instance, value.into())
    }
}
