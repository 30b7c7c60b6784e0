//! Forwarding members.
//!
//! A detour member implements one member of a capability by forwarding to the object stored
//! in a target field. The forwarded member has to exist on the capability (or one of the
//! capabilities it inherits); this is checked when the descriptor is built.

use std::fmt;

use crate::{
    codegen::WrapFn,
    descriptor::{Dependency, FieldMember, MethodMember, OverrideTarget, ParameterDescriptor, PropertyMember},
    typesystem::{CapabilityRc, MethodSig, TypeSig},
    Result,
};

/// A method forwarding to the same-named method of the wrapped target.
pub struct DetourMethodMember {
    pub(crate) method: MethodMember,
    target_field: String,
    capability: CapabilityRc,
    pub(crate) wrap: Option<WrapFn>,
}

impl DetourMethodMember {
    /// Forwards `name` of `capability` to the object in `target_field`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MissingMember`] if the capability does not expose the method
    /// and [`crate::Error::AmbiguousDescriptor`] if it is overloaded; overloads are forwarded
    /// through [`DetourMethodMember::from_sig`].
    pub fn new(capability: &CapabilityRc, name: &str, target_field: impl Into<String>) -> Result<Self> {
        let (_, sig) = capability.resolve_method(name, None)?;
        Self::from_sig(capability, &sig, target_field)
    }

    /// Forwards the method `sig` of `capability`, one overload among several of that name.
    ///
    /// # Errors
    /// Returns [`crate::Error::MissingMember`] if neither the capability nor one it inherits
    /// declares `sig`.
    pub fn from_sig(
        capability: &CapabilityRc,
        sig: &MethodSig,
        target_field: impl Into<String>,
    ) -> Result<Self> {
        let (_, sig) = capability.resolve_method(&sig.name, Some(sig.params.as_slice()))?;
        let method = MethodMember::new(sig.name, sig.return_type)
            .with_parameters(sig.params.into_iter().map(ParameterDescriptor::new).collect())
            .overriding(OverrideTarget::Capability(capability.clone()));

        Ok(DetourMethodMember {
            method,
            target_field: target_field.into(),
            capability: capability.clone(),
            wrap: None,
        })
    }

    /// Passes every non-null result through `wrap`.
    #[must_use]
    pub fn with_wrap(mut self, wrap: WrapFn) -> Self {
        self.wrap = Some(wrap);
        self
    }

    /// The method being synthesized.
    #[must_use]
    pub fn method(&self) -> &MethodMember {
        &self.method
    }

    /// Field holding the wrapped target.
    #[must_use]
    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// The capability the method belongs to.
    #[must_use]
    pub fn capability(&self) -> &CapabilityRc {
        &self.capability
    }

    pub(crate) fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::Field(self.target_field.clone())]
    }
}

impl fmt::Debug for DetourMethodMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetourMethodMember")
            .field("method", &self.method)
            .field("target_field", &self.target_field)
            .field("capability", &self.capability.name())
            .field("wraps", &self.wrap.is_some())
            .finish()
    }
}

/// A property forwarding to the same-named property of the wrapped target.
///
/// With a wrap function and a cache field the getter memoizes its wrapped result; see
/// [`crate::codegen::detour::forward_get`].
pub struct DetourPropertyMember {
    pub(crate) property: PropertyMember,
    target_field: String,
    capability: CapabilityRc,
    pub(crate) wrap: Option<WrapFn>,
    cache_field: Option<String>,
}

impl DetourPropertyMember {
    /// Forwards `name` of `capability` to the object in `target_field`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MissingMember`] if the capability does not expose the property
    /// and [`crate::Error::AmbiguousDescriptor`] if several inherited capabilities declare it.
    pub fn new(capability: &CapabilityRc, name: &str, target_field: impl Into<String>) -> Result<Self> {
        let (_, sig) = capability.resolve_property(name, None)?;
        let property = PropertyMember::indexer(sig.name, sig.ty, sig.index)
            .with_access(sig.get, sig.set)
            .overriding(OverrideTarget::Capability(capability.clone()));

        Ok(DetourPropertyMember {
            property,
            target_field: target_field.into(),
            capability: capability.clone(),
            wrap: None,
            cache_field: None,
        })
    }

    /// Passes every non-null value read through `wrap`.
    #[must_use]
    pub fn with_wrap(mut self, wrap: WrapFn) -> Self {
        self.wrap = Some(wrap);
        self
    }

    /// Memoizes the wrapped value in the named field, created if absent.
    #[must_use]
    pub fn with_cache_field(mut self, name: impl Into<String>) -> Self {
        self.cache_field = Some(name.into());
        self
    }

    /// The property being synthesized.
    #[must_use]
    pub fn property(&self) -> &PropertyMember {
        &self.property
    }

    /// Field holding the wrapped target.
    #[must_use]
    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// Memoization field, if any.
    #[must_use]
    pub fn cache_field(&self) -> Option<&str> {
        self.cache_field.as_deref()
    }

    /// The capability the property belongs to.
    #[must_use]
    pub fn capability(&self) -> &CapabilityRc {
        &self.capability
    }

    pub(crate) fn prepare(&mut self) -> Option<FieldMember> {
        let cache = self.cache_field.as_ref()?;
        let ty = match self.property.ty() {
            TypeSig::Capability(_) | TypeSig::Class(_) => self.property.ty().clone(),
            _ => TypeSig::Object,
        };
        Some(FieldMember::generated(cache.clone(), ty))
    }

    pub(crate) fn dependencies(&self) -> Vec<Dependency> {
        std::iter::once(&self.target_field)
            .chain(self.cache_field.as_ref())
            .map(|name| Dependency::Field(name.clone()))
            .collect()
    }
}

impl fmt::Debug for DetourPropertyMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetourPropertyMember")
            .field("property", &self.property)
            .field("target_field", &self.target_field)
            .field("capability", &self.capability.name())
            .field("wraps", &self.wrap.is_some())
            .field("cache_field", &self.cache_field)
            .finish()
    }
}
