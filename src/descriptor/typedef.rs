use crate::{
    descriptor::{AttributeDescriptor, MemberDescriptor},
    runtime::{CompiledTypeRc, Instance, InstanceRc},
    typesystem::{CapabilityRc, Value},
    Error, Result,
};

/// Compilation state of a [`TypeDescriptor`].
///
/// Moves `Authoring -> Compiled` or `Authoring -> Failed`, never back.
#[derive(Debug, Clone, Default)]
pub enum CompileState {
    /// Members may still be added
    #[default]
    Authoring,
    /// Compiled successfully
    Compiled(CompiledTypeRc),
    /// A compile was attempted and aborted; the descriptor is unusable
    Failed,
}

/// The description of a type to synthesize.
///
/// # Examples
///
/// ```rust
/// use typeforge::prelude::*;
///
/// let synthesizer = Synthesizer::with_default_host();
/// let mut person = TypeDescriptor::new("Person");
/// person.add_member(PropertyMember::new("Name", TypeSig::String));
/// person.add_member(PropertyMember::new("Age", TypeSig::I4));
///
/// synthesizer.compile(&mut person)?;
/// let ada = person.create_instance(&[])?;
/// person.set_value(&ada, "Name", "Ada")?;
/// assert_eq!(person.get_value(&ada, "Name")?, Value::from("Ada"));
/// # Ok::<(), typeforge::Error>(())
/// ```
#[derive(Debug)]
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) natural_name: bool,
    pub(crate) base: Option<CompiledTypeRc>,
    pub(crate) capabilities: Vec<CapabilityRc>,
    pub(crate) members: Vec<MemberDescriptor>,
    pub(crate) attributes: Vec<AttributeDescriptor>,
    pub(crate) state: CompileState,
}

impl TypeDescriptor {
    /// A descriptor whose name is a template, disambiguated if the synthesizer asks for
    /// unique names.
    pub fn new(name: impl Into<String>) -> Self {
        TypeDescriptor {
            name: name.into(),
            natural_name: false,
            base: None,
            capabilities: Vec::new(),
            members: Vec::new(),
            attributes: Vec::new(),
            state: CompileState::Authoring,
        }
    }

    /// A descriptor whose name is used verbatim.
    pub fn with_natural_name(name: impl Into<String>) -> Self {
        TypeDescriptor {
            natural_name: true,
            ..Self::new(name)
        }
    }

    /// Derives from a previously compiled type.
    #[must_use]
    pub fn with_base(mut self, base: CompiledTypeRc) -> Self {
        self.base = Some(base);
        self
    }

    /// Requires a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: CapabilityRc) -> Self {
        self.add_capability(capability);
        self
    }

    /// Requires a capability; duplicates by name are ignored.
    pub fn add_capability(&mut self, capability: CapabilityRc) {
        if !self
            .capabilities
            .iter()
            .any(|c| c.name() == capability.name())
        {
            self.capabilities.push(capability);
        }
    }

    /// Sets the base type.
    pub fn set_base(&mut self, base: CompiledTypeRc) {
        self.base = Some(base);
    }

    /// Appends a member.
    pub fn add_member(&mut self, member: impl Into<MemberDescriptor>) -> &mut Self {
        self.members.push(member.into());
        self
    }

    /// Attaches a type-level metadata tag.
    pub fn add_attribute(&mut self, attribute: AttributeDescriptor) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    /// The name or name template.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the name is used verbatim.
    #[must_use]
    pub fn has_natural_name(&self) -> bool {
        self.natural_name
    }

    /// Base type, if any.
    #[must_use]
    pub fn base(&self) -> Option<&CompiledTypeRc> {
        self.base.as_ref()
    }

    /// Required capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[CapabilityRc] {
        &self.capabilities
    }

    /// Members in declaration order.
    #[must_use]
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    /// The first member named `name`.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name() == name)
    }

    /// Type-level metadata tags.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Compilation state.
    #[must_use]
    pub fn state(&self) -> &CompileState {
        &self.state
    }

    /// Returns `true` once compiled successfully.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        matches!(self.state, CompileState::Compiled(_))
    }

    /// The compiled type.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] if the descriptor has not been compiled.
    pub fn compiled(&self) -> Result<&CompiledTypeRc> {
        match &self.state {
            CompileState::Compiled(ty) => Ok(ty),
            CompileState::Authoring => Err(Error::InvalidDescriptor(format!(
                "type '{}' has not been compiled",
                self.name
            ))),
            CompileState::Failed => Err(Error::InvalidDescriptor(format!(
                "compilation of type '{}' failed",
                self.name
            ))),
        }
    }

    /// Creates an instance of the compiled type.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] before compilation, or the constructor's error.
    pub fn create_instance(&self, args: &[Value]) -> Result<InstanceRc> {
        self.compiled()?.create_instance(args)
    }

    /// Reads a property or field of `instance` through the bound descriptor.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if no readable member has that name.
    pub fn get_value(&self, instance: &Instance, name: &str) -> Result<Value> {
        for member in self.members.iter().filter(|m| m.name() == name) {
            match member {
                MemberDescriptor::Property(m) => return m.get_value(instance),
                MemberDescriptor::DetourProperty(m) => return m.property.get_value(instance),
                MemberDescriptor::Field(m) => return m.get_value(instance),
                _ => {}
            }
        }
        Err(Error::missing(&self.name, name))
    }

    /// Writes a property or field of `instance` through the bound descriptor.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if no writable member has that name.
    pub fn set_value(&self, instance: &Instance, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        for member in self.members.iter().filter(|m| m.name() == name) {
            match member {
                MemberDescriptor::Property(m) => return m.set_value(instance, value),
                MemberDescriptor::DetourProperty(m) => return m.property.set_value(instance, value),
                MemberDescriptor::Field(m) => return m.set_value(instance, value),
                _ => {}
            }
        }
        Err(Error::missing(&self.name, name))
    }

    pub(crate) fn begin_compile(&mut self) -> Result<()> {
        match self.state {
            CompileState::Authoring => {
                self.state = CompileState::Failed;
                Ok(())
            }
            _ => Err(Error::DoubleCompilation(self.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{descriptor::PropertyMember, typesystem::TypeSig};

    #[test]
    fn test_compile_only_once() {
        let mut descriptor = TypeDescriptor::new("Once");
        assert!(descriptor.begin_compile().is_ok());
        assert!(matches!(
            descriptor.begin_compile(),
            Err(Error::DoubleCompilation(name)) if name == "Once"
        ));
    }

    #[test]
    fn test_uncompiled_access() {
        let mut descriptor = TypeDescriptor::new("Draft");
        descriptor.add_member(PropertyMember::new("Name", TypeSig::String));
        assert!(descriptor.member("Name").is_some());
        assert!(!descriptor.is_compiled());
        assert!(matches!(
            descriptor.create_instance(&[]),
            Err(Error::InvalidDescriptor(_))
        ));
    }
}
