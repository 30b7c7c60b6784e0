//! Capabilities: the interfaces a synthesized type can be asked to satisfy.

use std::{
    collections::HashSet,
    sync::{Arc, OnceLock},
};

use crate::{typesystem::TypeSig, Error, Result};

/// Reference-counted capability, shared between descriptors, types and values.
pub type CapabilityRc = Arc<Capability>;

/// Signature of a property declared by a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySig {
    /// Property name
    pub name: String,
    /// Value type
    pub ty: TypeSig,
    /// Index parameter types, empty unless the property is an indexer
    pub index: Vec<TypeSig>,
    /// The capability declares a getter
    pub get: bool,
    /// The capability declares a setter
    pub set: bool,
}

impl PropertySig {
    /// Returns `true` if the property takes index parameters.
    #[must_use]
    pub fn is_indexer(&self) -> bool {
        !self.index.is_empty()
    }
}

/// Signature of a method declared by a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    /// Method name
    pub name: String,
    /// Return type, [`TypeSig::Void`] for none
    pub return_type: TypeSig,
    /// Parameter types in declaration order
    pub params: Vec<TypeSig>,
}

/// An interface: a named set of property and method signatures.
///
/// Capabilities can inherit other capabilities. A type that implements a capability implements
/// all of its inherited capabilities as well. Marker tags classify a capability without adding
/// members; [`Capability::FOREIGN`] marks objects whose lifetime is owned by an external resource
/// and which the proxy layer wraps recursively.
#[derive(Debug)]
pub struct Capability {
    name: String,
    inherited: Vec<CapabilityRc>,
    properties: Vec<PropertySig>,
    methods: Vec<MethodSig>,
    markers: Vec<String>,
}

impl Capability {
    /// Marker tag of foreign, wrappable capabilities.
    pub const FOREIGN: &'static str = "Foreign";

    /// Name of the built-in disposable capability.
    pub const DISPOSABLE: &'static str = "Typeforge.IDisposable";

    /// Name of the disposal method of [`Capability::disposable`].
    pub const DISPOSE: &'static str = "Dispose";

    /// The process-wide disposable capability with its single `Dispose()` method.
    #[must_use]
    pub fn disposable() -> CapabilityRc {
        static DISPOSABLE: OnceLock<CapabilityRc> = OnceLock::new();
        DISPOSABLE
            .get_or_init(|| {
                CapabilityBuilder::new(Capability::DISPOSABLE)
                    .method(Capability::DISPOSE, TypeSig::Void, vec![])
                    .build()
            })
            .clone()
    }

    /// Full name of the capability.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without namespace qualification, used to derive member names.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Directly inherited capabilities.
    #[must_use]
    pub fn inherited(&self) -> &[CapabilityRc] {
        &self.inherited
    }

    /// Properties declared by this capability itself.
    #[must_use]
    pub fn properties(&self) -> &[PropertySig] {
        &self.properties
    }

    /// Methods declared by this capability itself.
    #[must_use]
    pub fn methods(&self) -> &[MethodSig] {
        &self.methods
    }

    /// Marker tags.
    #[must_use]
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Looks up a property declared by this capability itself.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySig> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Looks up a method declared by this capability itself.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodSig> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Returns `true` if this capability or any inherited one carries `marker`.
    #[must_use]
    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
            || self.inherited.iter().any(|c| c.has_marker(marker))
    }

    /// Returns `true` for foreign, wrappable capabilities.
    #[must_use]
    pub fn is_foreign(&self) -> bool {
        self.has_marker(Capability::FOREIGN)
    }

    /// Returns `true` if this capability is `name` or inherits it.
    #[must_use]
    pub fn extends(&self, name: &str) -> bool {
        self.name == name || self.inherited.iter().any(|c| c.extends(name))
    }

    /// Walks this capability and every inherited capability, depth first, without duplicates.
    #[must_use]
    pub fn iter_self_and_inherited(self: &Arc<Self>) -> Vec<CapabilityRc> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut stack = vec![self.clone()];

        while let Some(capability) = stack.pop() {
            if !seen.insert(capability.name.clone()) {
                continue;
            }
            for parent in capability.inherited.iter().rev() {
                stack.push(parent.clone());
            }
            result.push(capability);
        }

        result
    }

    /// Every property of the hierarchy, paired with the capability declaring it.
    #[must_use]
    pub fn all_properties(self: &Arc<Self>) -> Vec<(CapabilityRc, PropertySig)> {
        self.iter_self_and_inherited()
            .into_iter()
            .flat_map(|c| {
                c.properties
                    .iter()
                    .map(|p| (c.clone(), p.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Every method of the hierarchy, paired with the capability declaring it.
    #[must_use]
    pub fn all_methods(self: &Arc<Self>) -> Vec<(CapabilityRc, MethodSig)> {
        self.iter_self_and_inherited()
            .into_iter()
            .flat_map(|c| {
                c.methods
                    .iter()
                    .map(|m| (c.clone(), m.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Resolves the property `name` across the hierarchy by exact name.
    ///
    /// For indexers pass the index parameter types; they must match as well.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if no property matches and
    /// [`Error::AmbiguousDescriptor`] if several inherited capabilities declare one.
    pub fn resolve_property(
        self: &Arc<Self>,
        name: &str,
        index: Option<&[TypeSig]>,
    ) -> Result<(CapabilityRc, PropertySig)> {
        let mut candidates: Vec<_> = self
            .all_properties()
            .into_iter()
            .filter(|(_, p)| p.name == name && index.map_or(true, |index| p.index == index))
            .collect();

        match candidates.len() {
            0 => Err(Error::missing(&self.name, name)),
            1 => Ok(candidates.remove(0)),
            n => Err(Error::AmbiguousDescriptor {
                member: format!("{}.{name}", self.name),
                candidates: n,
            }),
        }
    }

    /// Resolves the method `name` across the hierarchy by exact name.
    ///
    /// Pass parameter types to select among overloads.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if no method matches and
    /// [`Error::AmbiguousDescriptor`] if several do.
    pub fn resolve_method(
        self: &Arc<Self>,
        name: &str,
        params: Option<&[TypeSig]>,
    ) -> Result<(CapabilityRc, MethodSig)> {
        let mut candidates: Vec<_> = self
            .all_methods()
            .into_iter()
            .filter(|(_, m)| m.name == name && params.map_or(true, |params| m.params == params))
            .collect();

        match candidates.len() {
            0 => Err(Error::missing(&self.name, name)),
            1 => Ok(candidates.remove(0)),
            n => Err(Error::AmbiguousDescriptor {
                member: format!("{}.{name}", self.name),
                candidates: n,
            }),
        }
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Fluent builder for [`Capability`] values.
///
/// # Examples
///
/// ```rust
/// use typeforge::typesystem::{Capability, CapabilityBuilder, TypeSig};
///
/// let named = CapabilityBuilder::new("Demo.INamed")
///     .property("Name", TypeSig::String)
///     .build();
///
/// let resource = CapabilityBuilder::new("Demo.IResource")
///     .inherits(named.clone())
///     .inherits(Capability::disposable())
///     .readonly_property("Size", TypeSig::I8)
///     .marker(Capability::FOREIGN)
///     .build();
///
/// assert!(resource.is_foreign());
/// assert!(resource.extends("Demo.INamed"));
/// assert_eq!(resource.all_properties().len(), 2);
/// ```
pub struct CapabilityBuilder {
    name: String,
    inherited: Vec<CapabilityRc>,
    properties: Vec<PropertySig>,
    methods: Vec<MethodSig>,
    markers: Vec<String>,
}

impl CapabilityBuilder {
    /// Starts a capability with the given full name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inherited: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Adds an inherited capability.
    #[must_use]
    pub fn inherits(mut self, capability: CapabilityRc) -> Self {
        self.inherited.push(capability);
        self
    }

    /// Adds a read/write property.
    #[must_use]
    pub fn property(self, name: impl Into<String>, ty: TypeSig) -> Self {
        self.property_sig(PropertySig {
            name: name.into(),
            ty,
            index: Vec::new(),
            get: true,
            set: true,
        })
    }

    /// Adds a get-only property.
    #[must_use]
    pub fn readonly_property(self, name: impl Into<String>, ty: TypeSig) -> Self {
        self.property_sig(PropertySig {
            name: name.into(),
            ty,
            index: Vec::new(),
            get: true,
            set: false,
        })
    }

    /// Adds a read/write indexer.
    #[must_use]
    pub fn indexer(self, name: impl Into<String>, ty: TypeSig, index: Vec<TypeSig>) -> Self {
        self.property_sig(PropertySig {
            name: name.into(),
            ty,
            index,
            get: true,
            set: true,
        })
    }

    /// Adds a fully specified property signature.
    #[must_use]
    pub fn property_sig(mut self, sig: PropertySig) -> Self {
        self.properties.push(sig);
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn method(
        mut self,
        name: impl Into<String>,
        return_type: TypeSig,
        params: Vec<TypeSig>,
    ) -> Self {
        self.methods.push(MethodSig {
            name: name.into(),
            return_type,
            params,
        });
        self
    }

    /// Adds a marker tag.
    #[must_use]
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Finishes the capability.
    #[must_use]
    pub fn build(self) -> CapabilityRc {
        Arc::new(Capability {
            name: self.name,
            inherited: self.inherited,
            properties: self.properties,
            methods: self.methods,
            markers: self.markers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_deduplicated() {
        let root = CapabilityBuilder::new("IRoot").property("Id", TypeSig::I4).build();
        let left = CapabilityBuilder::new("ILeft").inherits(root.clone()).build();
        let right = CapabilityBuilder::new("IRight").inherits(root.clone()).build();
        let both = CapabilityBuilder::new("IBoth")
            .inherits(left)
            .inherits(right)
            .build();

        let names: Vec<_> = both
            .iter_self_and_inherited()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["IBoth", "ILeft", "IRoot", "IRight"]);
        assert_eq!(both.all_properties().len(), 1);
    }

    #[test]
    fn test_foreign_marker_inherited() {
        let base = CapabilityBuilder::new("IHandle")
            .marker(Capability::FOREIGN)
            .build();
        let derived = CapabilityBuilder::new("IFile").inherits(base).build();
        assert!(derived.is_foreign());
        assert!(!Capability::disposable().is_foreign());
    }

    #[test]
    fn test_short_name() {
        let capability = CapabilityBuilder::new("Demo.Data.IRecord").build();
        assert_eq!(capability.short_name(), "IRecord");
        let plain = CapabilityBuilder::new("IRecord").build();
        assert_eq!(plain.short_name(), "IRecord");
    }

    #[test]
    fn test_disposable_is_shared() {
        let a = Capability::disposable();
        let b = Capability::disposable();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.method(Capability::DISPOSE).is_some());
        assert_eq!(a.name(), "Typeforge.IDisposable");
    }

    #[test]
    fn test_resolve_property() -> Result<()> {
        let left = CapabilityBuilder::new("ILeft").property("Name", TypeSig::String).build();
        let right = CapabilityBuilder::new("IRight").property("Name", TypeSig::String).build();
        let both = CapabilityBuilder::new("IBoth")
            .inherits(left.clone())
            .inherits(right)
            .indexer("Item", TypeSig::Object, vec![TypeSig::String])
            .build();

        let (owner, sig) = left.resolve_property("Name", None)?;
        assert_eq!(owner.name(), "ILeft");
        assert_eq!(sig.ty, TypeSig::String);

        assert!(matches!(
            both.resolve_property("Name", None),
            Err(Error::AmbiguousDescriptor { candidates: 2, .. })
        ));
        assert!(matches!(
            both.resolve_property("Missing", None),
            Err(Error::MissingMember { .. })
        ));
        assert!(both.resolve_property("Item", Some(&[TypeSig::String])).is_ok());
        assert!(both.resolve_property("Item", Some(&[TypeSig::I4])).is_err());
        Ok(())
    }
}
