use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{
    codegen::{method_gen, MethodBody, MethodGen},
    descriptor::{AttributeDescriptor, Dependency, MethodAttributes, OverrideTarget, ParameterDescriptor},
    runtime::{Instance, MethodHandle},
    token::Token,
    typesystem::{CapabilityRc, TypeSig, Value},
    Error, Result,
};

/// A method: return type, parameters and a body strategy.
///
/// A method without body strategy gets an empty body returning `Null`.
pub struct MethodMember {
    name: String,
    return_type: TypeSig,
    params: Vec<ParameterDescriptor>,
    flags: MethodAttributes,
    pub(crate) body: Option<MethodGen>,
    pub(crate) overrides: Vec<OverrideTarget>,
    pub(crate) attributes: Vec<AttributeDescriptor>,
    pub(crate) depends_on: Vec<Dependency>,
    pub(crate) defined: bool,
    pub(crate) token: Option<Token>,
    pub(crate) bound: OnceLock<Arc<MethodHandle>>,
}

impl MethodMember {
    /// A public method without parameters.
    pub fn new(name: impl Into<String>, return_type: TypeSig) -> Self {
        MethodMember {
            name: name.into(),
            return_type,
            params: Vec::new(),
            flags: MethodAttributes::default(),
            body: None,
            overrides: Vec::new(),
            attributes: Vec::new(),
            depends_on: Vec::new(),
            defined: false,
            token: None,
            bound: OnceLock::new(),
        }
    }

    /// A method implementing the same-named method of `capability`.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the capability has no such method and
    /// [`Error::AmbiguousDescriptor`] if the name is overloaded.
    pub fn from_capability(capability: &CapabilityRc, name: &str) -> Result<Self> {
        let (_, sig) = capability.resolve_method(name, None)?;
        Ok(Self::new(sig.name, sig.return_type)
            .with_parameters(sig.params.into_iter().map(ParameterDescriptor::new).collect())
            .overriding(OverrideTarget::Capability(capability.clone())))
    }

    /// Appends a parameter.
    #[must_use]
    pub fn with_parameter(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Replaces the parameter list.
    #[must_use]
    pub fn with_parameters(mut self, params: Vec<ParameterDescriptor>) -> Self {
        self.params = params;
        self
    }

    /// Supplies the body strategy.
    #[must_use]
    pub fn with_body(mut self, body: MethodGen) -> Self {
        self.body = Some(body);
        self
    }

    /// Supplies a ready-made body.
    #[must_use]
    pub fn with_body_fn(self, body: MethodBody) -> Self {
        self.with_body(method_gen(body))
    }

    /// Declares that the method satisfies the same-named method of `target`.
    #[must_use]
    pub fn overriding(mut self, target: OverrideTarget) -> Self {
        self.overrides.push(target);
        self
    }

    /// Replaces the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: MethodAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Attaches a metadata tag.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Requires `dependency` to be defined before this method's body is generated.
    #[must_use]
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.depends_on.push(dependency);
        self
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return type.
    #[must_use]
    pub fn return_type(&self) -> &TypeSig {
        &self.return_type
    }

    /// Parameters.
    #[must_use]
    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    /// Flags.
    #[must_use]
    pub fn flags(&self) -> MethodAttributes {
        self.flags
    }

    /// Override targets.
    #[must_use]
    pub fn overrides(&self) -> &[OverrideTarget] {
        &self.overrides
    }

    /// The compiled handle, once bound.
    #[must_use]
    pub fn handle(&self) -> Option<&Arc<MethodHandle>> {
        self.bound.get()
    }

    /// Invokes the bound method on `instance`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] before the owning type is compiled, or whatever the
    /// body raises.
    pub fn invoke(&self, instance: &Instance, args: &[Value]) -> Result<Value> {
        self.bound
            .get()
            .ok_or_else(|| Error::InvalidDescriptor(format!("method '{}' is not bound", self.name)))?
            .invoke(instance, args)
    }
}

impl fmt::Debug for MethodMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMember")
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("params", &self.params)
            .field("flags", &self.flags)
            .field("has_body", &self.body.is_some())
            .field("overrides", &self.overrides.len())
            .field("defined", &self.defined)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::CapabilityBuilder;

    #[test]
    fn test_from_capability_copies_signature() {
        let greeter = CapabilityBuilder::new("IGreeter")
            .method("Greet", TypeSig::String, vec![TypeSig::String, TypeSig::I4])
            .build();

        let method = MethodMember::from_capability(&greeter, "Greet").unwrap();
        assert_eq!(method.return_type(), &TypeSig::String);
        assert_eq!(method.params().len(), 2);
        assert_eq!(method.params()[1].ty(), &TypeSig::I4);
        assert!(matches!(method.overrides(), [OverrideTarget::Capability(_)]));
    }

    #[test]
    fn test_from_capability_missing() {
        let empty = CapabilityBuilder::new("IEmpty").build();
        assert!(matches!(
            MethodMember::from_capability(&empty, "Run"),
            Err(Error::MissingMember { .. })
        ));
    }
}
