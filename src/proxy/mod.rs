//! Forwarding proxies over foreign objects.
//!
//! A proxy is an instance of a synthesized wrapper type that implements one capability purely
//! by forwarding to a wrapped target object. The wrapper type of a capability is built once and
//! kept in a [`WrapperRegistry`]; every further proxy of that capability is just a new instance
//! holding a different target.
//!
//! # Wrapper Layout
//!
//! For a capability `Demo.IFile` the wrapper type `Managed_Demo.IFile` holds:
//!
//! - `source_IFile`, the wrapped target, set by the single constructor
//! - one forwarding property per property of the capability hierarchy; properties whose type
//!   is a foreign capability get a cache field `source_<Property>` and hand out a nested proxy
//!   built on first read and reused afterwards
//! - one forwarding method per method of the hierarchy; foreign results are wrapped on every
//!   call
//! - an idempotent `Dispose` that disposes every materialized nested proxy, then releases the
//!   target through the [`ForeignRelease`] collaborator
//! - a finalizer calling `Dispose`, so targets are released even if nobody disposes the proxy
//!
//! # Examples
//!
//! ```rust
//! use typeforge::prelude::*;
//!
//! let file = CapabilityBuilder::new("Demo.IFile")
//!     .property("Path", TypeSig::String)
//!     .marker(Capability::FOREIGN)
//!     .build();
//!
//! let target = PropertyBag::new("NativeFile").with("Path", "/tmp/a").into_object();
//! let proxies = ProxyFactory::new(Synthesizer::with_default_host());
//!
//! let proxy = proxies.wrap(&file, Value::Object(target))?;
//! assert_eq!(proxy.get("Path")?, Value::from("/tmp/a"));
//! proxy.dispose()?;
//! # Ok::<(), typeforge::Error>(())
//! ```

mod registry;

pub use registry::WrapperRegistry;

use std::sync::{Arc, Weak};

use tracing::debug;

use crate::{
    codegen::{accessor::store_arguments, EmitScope, MethodGen, WrapFn},
    descriptor::{
        ConstructorMember, Dependency, DetourMethodMember, DetourPropertyMember, DisposalMember,
        FieldMember, FinalizerMember, ParameterDescriptor, TypeDescriptor,
    },
    runtime::{CompiledTypeRc, InstanceRc},
    synthesis::Synthesizer,
    typesystem::{Capability, CapabilityRc, ForeignRelease, InvokeRelease, TypeSig, Value},
    Error, Result,
};

struct ProxyInner {
    synthesizer: Synthesizer,
    registry: WrapperRegistry,
    release: Arc<dyn ForeignRelease>,
}

/// Builds forwarding proxies.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct ProxyFactory {
    inner: Arc<ProxyInner>,
}

impl ProxyFactory {
    /// A factory releasing targets with [`InvokeRelease`].
    #[must_use]
    pub fn new(synthesizer: Synthesizer) -> Self {
        Self::with_release(synthesizer, Arc::new(InvokeRelease))
    }

    /// A factory releasing targets through `release`.
    #[must_use]
    pub fn with_release(synthesizer: Synthesizer, release: Arc<dyn ForeignRelease>) -> Self {
        ProxyFactory {
            inner: Arc::new(ProxyInner {
                synthesizer,
                registry: WrapperRegistry::new(),
                release,
            }),
        }
    }

    /// The synthesizer wrapper types are compiled with.
    #[must_use]
    pub fn synthesizer(&self) -> &Synthesizer {
        &self.inner.synthesizer
    }

    /// The wrapper type registry.
    #[must_use]
    pub fn registry(&self) -> &WrapperRegistry {
        &self.inner.registry
    }

    /// Wraps `target` in a proxy implementing `capability`.
    ///
    /// # Errors
    /// Returns [`Error::NullReference`] for a null target, [`Error::TypeMismatch`] for a
    /// non-object target, and any synthesis error raised while building the wrapper type.
    pub fn wrap(&self, capability: &CapabilityRc, target: Value) -> Result<InstanceRc> {
        match &target {
            Value::Object(_) => {}
            Value::Null => return Err(Error::NullReference(capability.name().to_string())),
            other => {
                return Err(Error::TypeMismatch {
                    expected: capability.name().to_string(),
                    found: other.describe(),
                })
            }
        }

        let ty = self.wrapper_type(capability)?;
        ty.create_instance(&[target])
    }

    /// The wrapper type of `capability`, built on first use.
    ///
    /// # Errors
    /// Returns any synthesis error raised while building the type.
    pub fn wrapper_type(&self, capability: &CapabilityRc) -> Result<CompiledTypeRc> {
        self.inner
            .registry
            .get_or_create(capability.name(), || self.build(capability))
    }

    /// Wrap function producing nested proxies of `capability` through this factory.
    fn nested(&self, capability: &CapabilityRc) -> WrapFn {
        let factory: Weak<ProxyInner> = Arc::downgrade(&self.inner);
        let capability = capability.clone();
        Arc::new(move |raw: Value| {
            let inner = factory
                .upgrade()
                .ok_or_else(|| Error::Error("proxy factory has been dropped".to_string()))?;
            let proxy = ProxyFactory { inner }.wrap(&capability, raw)?;
            Ok(proxy.to_value())
        })
    }

    fn build(&self, capability: &CapabilityRc) -> Result<CompiledTypeRc> {
        let config = self.inner.synthesizer.config();
        let source = format!("source_{}", capability.short_name());

        let mut descriptor = TypeDescriptor::with_natural_name(format!(
            "{}{}",
            config.wrapper_prefix,
            capability.name()
        ))
        .with_capability(capability.clone());

        descriptor.add_member(FieldMember::new(&source, TypeSig::Object));
        descriptor.add_member(
            ConstructorMember::with_parameters(vec![ParameterDescriptor::named(
                "source",
                TypeSig::Object,
            )])
            .with_body(store_into(source.clone()))
            .depends_on(Dependency::Field(source.clone())),
        );

        let mut caches = Vec::new();
        for (declaring, sig) in capability.all_properties() {
            let mut detour = DetourPropertyMember::new(&declaring, &sig.name, &source)?;
            if let Some(nested) = sig.ty.capability().filter(|c| c.is_foreign()) {
                let cache = format!("source_{}", sig.name);
                detour = detour
                    .with_wrap(self.nested(nested))
                    .with_cache_field(&cache);
                caches.push(cache);
            }
            descriptor.add_member(detour);
        }

        for (declaring, sig) in capability.all_methods() {
            if declaring.name() == Capability::DISPOSABLE {
                continue;
            }
            let mut detour = DetourMethodMember::from_sig(&declaring, &sig, &source)?;
            if let Some(nested) = sig.return_type.capability().filter(|c| c.is_foreign()) {
                detour = detour.with_wrap(self.nested(nested));
            }
            descriptor.add_member(detour);
        }

        descriptor.add_member(
            DisposalMember::new(&source)
                .with_children(caches)
                .with_release_via(self.inner.release.clone()),
        );
        descriptor.add_member(FinalizerMember::new());

        let ty = self.inner.synthesizer.compile(&mut descriptor)?;
        debug!(capability = %capability.name(), ty = %ty.name(), "wrapper type built");
        Ok(ty)
    }
}

/// Constructor body storing its single argument into `field`.
fn store_into(field: String) -> MethodGen {
    Arc::new(move |scope: &EmitScope<'_>| Ok(store_arguments(vec![scope.field(&field)?])))
}

impl std::fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("synthesizer", &self.inner.synthesizer)
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::{CapabilityBuilder, PropertyBag};

    fn named() -> CapabilityRc {
        CapabilityBuilder::new("Test.INamed")
            .property("Name", TypeSig::String)
            .marker(Capability::FOREIGN)
            .build()
    }

    #[test]
    fn test_wrapper_layout() -> Result<()> {
        let factory = ProxyFactory::new(Synthesizer::with_default_host());
        let ty = factory.wrapper_type(&named())?;

        assert_eq!(ty.name(), "Managed_Test.INamed");
        assert!(ty.implements("Test.INamed"));
        assert!(ty.implements(Capability::DISPOSABLE));
        assert!(ty.field("source_INamed").is_some());
        assert!(ty.field("_disposed").is_some());
        assert!(ty.has_finalizer());
        Ok(())
    }

    #[test]
    fn test_wrapper_type_shared() -> Result<()> {
        let factory = ProxyFactory::new(Synthesizer::with_default_host());
        let capability = named();

        let a = factory.wrap(&capability, PropertyBag::new("A").with("Name", "a").into_object().into())?;
        let b = factory.wrap(&capability, PropertyBag::new("B").with("Name", "b").into_object().into())?;

        assert!(Arc::ptr_eq(a.compiled_type(), b.compiled_type()));
        assert_eq!(a.get("Name")?, Value::from("a"));
        assert_eq!(b.get("Name")?, Value::from("b"));
        assert_eq!(factory.registry().len(), 1);
        Ok(())
    }

    #[test]
    fn test_wrap_rejects_null_target() {
        let factory = ProxyFactory::new(Synthesizer::with_default_host());
        assert!(matches!(
            factory.wrap(&named(), Value::Null),
            Err(Error::NullReference(_))
        ));
        assert!(matches!(
            factory.wrap(&named(), Value::I32(3)),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
