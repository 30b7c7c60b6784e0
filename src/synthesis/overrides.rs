//! Override resolution.
//!
//! An override target names a capability (or the base type). The member it satisfies is found
//! by exact name; indexers match their index parameter types and methods their parameter
//! types as well. The result is a [`MemberRef`] naming the capability that actually declares
//! the member, which may be one the target inherits.

use std::sync::Arc;

use crate::{
    descriptor::{OverrideTarget, PropertyMember},
    host::TypeBuilder,
    runtime::{MemberRef, MethodHandle, PropertyHandle},
    typesystem::{CapabilityRc, TypeSig},
    Error, Result,
};

/// What a property overrides.
pub(crate) struct PropertyOverrides {
    pub refs: Vec<MemberRef>,
    pub base: Option<Arc<PropertyHandle>>,
}

/// What a method overrides.
pub(crate) struct MethodOverrides {
    pub refs: Vec<MemberRef>,
    pub base: Option<Arc<MethodHandle>>,
}

/// Resolves the override targets of `property`.
///
/// Enabling an accessor that none of the capability targets declares is a
/// [`Error::MissingMember`].
pub(crate) fn resolve_property(
    builder: &dyn TypeBuilder,
    property: &PropertyMember,
) -> Result<PropertyOverrides> {
    let mut resolved = PropertyOverrides {
        refs: Vec::new(),
        base: None,
    };

    let (mut declares_get, mut declares_set) = (false, false);
    for target in property.overrides() {
        match target {
            OverrideTarget::Capability(capability) => {
                let (declaring, sig) =
                    capability.resolve_property(property.name(), Some(property.index()))?;
                declares_get |= sig.get;
                declares_set |= sig.set;
                resolved.refs.push(MemberRef {
                    capability: declaring,
                    name: sig.name,
                });
            }
            OverrideTarget::Base => {
                let base = builder
                    .base()
                    .and_then(|base| base.property(property.name()).cloned())
                    .filter(|base| base.index() == property.index())
                    .ok_or_else(|| {
                        Error::missing(format!("{}::base", builder.name()), property.name())
                    })?;
                resolved.base = Some(base);
            }
        }
    }

    if let Some(first) = resolved.refs.first() {
        let owner = first.capability.name();
        if property.can_read() && !declares_get {
            return Err(Error::missing(owner, format!("{}.get", property.name())));
        }
        if property.can_write() && !declares_set {
            return Err(Error::missing(owner, format!("{}.set", property.name())));
        }
    }
    Ok(resolved)
}

/// Resolves the override targets of a method named `name` taking `params`.
pub(crate) fn resolve_method(
    builder: &dyn TypeBuilder,
    name: &str,
    params: &[TypeSig],
    targets: &[OverrideTarget],
) -> Result<MethodOverrides> {
    let mut resolved = MethodOverrides {
        refs: Vec::new(),
        base: None,
    };

    for target in targets {
        match target {
            OverrideTarget::Capability(capability) => {
                let (declaring, sig) = capability.resolve_method(name, Some(params))?;
                resolved.refs.push(MemberRef {
                    capability: declaring,
                    name: sig.name,
                });
            }
            OverrideTarget::Base => {
                let base = builder
                    .base()
                    .and_then(|base| {
                        base.hierarchy()
                            .flat_map(|ty| ty.methods().iter())
                            .find(|m| {
                                m.name() == name
                                    && m.params().len() == params.len()
                                    && m.params().iter().zip(params).all(|(p, ty)| p.ty() == ty)
                            })
                            .cloned()
                    })
                    .ok_or_else(|| Error::missing(format!("{}::base", builder.name()), name))?;
                resolved.base = Some(base);
            }
        }
    }
    Ok(resolved)
}

/// Capabilities named as override targets, in member order, without duplicates.
pub(crate) fn target_capabilities<'a, I>(targets: I) -> Vec<CapabilityRc>
where
    I: IntoIterator<Item = &'a OverrideTarget>,
{
    let mut capabilities: Vec<CapabilityRc> = Vec::new();
    for target in targets {
        if let OverrideTarget::Capability(capability) = target {
            if !capabilities.iter().any(|c| c.name() == capability.name()) {
                capabilities.push(capability.clone());
            }
        }
    }
    capabilities
}
