//! The synthesis engine.
//!
//! [`Synthesizer::compile`] turns a [`TypeDescriptor`] into a live [`CompiledType`] in three
//! phases:
//!
//! 1. **Define**: every member is allocated on a fresh [`TypeBuilder`] and its bodies are
//!    generated. Members that depend on siblings (a property on its backing field, a finalizer
//!    on `Dispose`) have those siblings defined first. Auxiliary fields (implicit backing
//!    storage, wrapper caches, the disposed flag) are appended to the descriptor beforehand
//!    unless a field of that name already exists.
//! 2. **Finalize**: the builder is sealed; the code host resolves every capability member to
//!    its implementation.
//! 3. **Bind**: each descriptor is bound to its handle on the compiled type.
//!
//! A compile is all-or-nothing. After a failed attempt the descriptor is unusable and a new one
//! has to be built.
//!
//! # Naming
//!
//! Descriptor names are templates unless created with
//! [`TypeDescriptor::with_natural_name`]. With [`SynthesisConfig::ensure_unique_names`] set,
//! templates are disambiguated by a per-template counter and the member count.
//!
//! [`CompiledType`]: crate::runtime::CompiledType
//! [`TypeBuilder`]: crate::host::TypeBuilder

mod bind;
mod define;
mod naming;
mod overrides;

pub use naming::NameGenerator;

use std::sync::Arc;

use tracing::debug;

use crate::{
    config::SynthesisConfig,
    descriptor::{CompileState, Dependency, MemberDescriptor, TypeDescriptor},
    host::{CodeHost, DefaultHost, TypeBuilder},
    runtime::CompiledTypeRc,
    Error, Result,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    Visiting,
    Done,
}

/// Compiles type descriptors on a code host.
///
/// Cheap to clone; clones share the host and the name counters.
///
/// # Examples
///
/// ```rust
/// use typeforge::prelude::*;
///
/// let named = CapabilityBuilder::new("Demo.INamed")
///     .property("Name", TypeSig::String)
///     .build();
///
/// let synthesizer = Synthesizer::with_default_host();
/// let mut descriptor = TypeDescriptor::new("Named");
/// descriptor.add_member(PropertyMember::from_capability(&named, "Name")?);
///
/// let ty = synthesizer.compile(&mut descriptor)?;
/// assert!(ty.implements("Demo.INamed"));
/// assert!(ty.name().starts_with("Named_"));
///
/// let instance = ty.create_instance(&[])?;
/// instance.set_via("Demo.INamed", "Name", "Ada")?;
/// assert_eq!(instance.get("Name")?, Value::from("Ada"));
/// # Ok::<(), typeforge::Error>(())
/// ```
#[derive(Clone)]
pub struct Synthesizer {
    host: Arc<dyn CodeHost>,
    names: Arc<NameGenerator>,
    config: Arc<SynthesisConfig>,
}

impl Synthesizer {
    /// A synthesizer on `host`.
    pub fn new(host: Arc<dyn CodeHost>, config: SynthesisConfig) -> Self {
        Synthesizer {
            host,
            names: Arc::new(NameGenerator::new()),
            config: Arc::new(config),
        }
    }

    /// A synthesizer on a fresh [`DefaultHost`] with the default configuration.
    #[must_use]
    pub fn with_default_host() -> Self {
        Self::new(Arc::new(DefaultHost::new()), SynthesisConfig::default())
    }

    /// A synthesizer on a fresh [`DefaultHost`] with `config`.
    #[must_use]
    pub fn with_config(config: SynthesisConfig) -> Self {
        Self::new(Arc::new(DefaultHost::new()), config)
    }

    /// The code host.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn CodeHost> {
        &self.host
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// The name generator.
    #[must_use]
    pub fn names(&self) -> &NameGenerator {
        &self.names
    }

    /// Compiles `descriptor`.
    ///
    /// # Errors
    /// Returns [`Error::DoubleCompilation`] if the descriptor was compiled (or attempted) before,
    /// and any definition or sealing error otherwise. After an error the descriptor stays in
    /// [`CompileState::Failed`].
    pub fn compile(&self, descriptor: &mut TypeDescriptor) -> Result<CompiledTypeRc> {
        descriptor.begin_compile()?;
        self.host.initialize()?;

        let name = self.names.resolve(
            &descriptor.name,
            descriptor.natural_name,
            descriptor.members.len(),
            &self.config,
        );
        debug!(template = %descriptor.name, ty = %name, members = descriptor.members.len(), "synthesis started");

        let implied = overrides::target_capabilities(
            descriptor.members.iter().flat_map(MemberDescriptor::overrides),
        );
        for capability in implied {
            descriptor.add_capability(capability);
        }
        self.expand(descriptor);

        let mut builder = self.host.define_type(&name, descriptor.base.clone())?;
        for capability in &descriptor.capabilities {
            builder.add_capability(capability.clone());
        }
        for attribute in define::embed_attributes(builder.as_ref(), &descriptor.attributes)? {
            builder.set_attribute(attribute);
        }

        self.define_all(builder.as_mut(), &mut descriptor.members)?;
        debug!(ty = %name, members = descriptor.members.len(), "members defined");

        let ty = builder.seal()?;
        bind::bind_members(&ty, &descriptor.members)?;
        descriptor.state = CompileState::Compiled(ty.clone());
        debug!(ty = %ty.name(), token = %ty.token(), "synthesis finished");
        Ok(ty)
    }

    /// Appends the auxiliary fields members ask for, skipping names that already exist on the
    /// descriptor or the base type.
    fn expand(&self, descriptor: &mut TypeDescriptor) {
        let mut auxiliary = Vec::new();
        for member in &mut descriptor.members {
            auxiliary.extend(member.prepare(&self.config));
        }

        for field in auxiliary {
            let declared = descriptor
                .members
                .iter()
                .any(|m| m.satisfies(&Dependency::Field(field.name().to_string())));
            let inherited = descriptor
                .base
                .as_ref()
                .is_some_and(|base| base.field(field.name()).is_some());
            if !declared && !inherited {
                descriptor.members.push(field.into());
            }
        }
    }

    /// Defines every member in list order, dependencies first.
    fn define_all(&self, builder: &mut dyn TypeBuilder, members: &mut [MemberDescriptor]) -> Result<()> {
        let mut state: Vec<Visit> = members
            .iter()
            .map(|m| if m.is_defined() { Visit::Done } else { Visit::Pending })
            .collect();
        for index in 0..members.len() {
            self.visit(builder, members, &mut state, index)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        builder: &mut dyn TypeBuilder,
        members: &mut [MemberDescriptor],
        state: &mut [Visit],
        index: usize,
    ) -> Result<()> {
        match state[index] {
            Visit::Done => return Ok(()),
            Visit::Visiting => {
                return Err(Error::InvalidDescriptor(format!(
                    "member '{}' depends on itself",
                    members[index].name()
                )))
            }
            Visit::Pending => state[index] = Visit::Visiting,
        }

        for dependency in members[index].dependencies() {
            let provider = members
                .iter()
                .enumerate()
                .find(|(i, m)| *i != index && m.satisfies(&dependency))
                .map(|(i, _)| i);
            if let Some(provider) = provider {
                self.visit(builder, members, state, provider)?;
            }
        }

        define::define_member(builder, &mut members[index], &self.config)?;
        state[index] = Visit::Done;
        Ok(())
    }
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("config", &self.config)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{FieldMember, FinalizerMember, MethodMember, PropertyMember},
        typesystem::{TypeSig, Value},
    };

    #[test]
    fn test_dependencies_defined_first() -> Result<()> {
        let synthesizer = Synthesizer::with_default_host();
        let mut descriptor = TypeDescriptor::new("Ordered");
        descriptor.add_member(
            PropertyMember::new("Name", TypeSig::String).with_backing_field("store")?,
        );
        descriptor.add_member(FieldMember::new("store", TypeSig::String));

        let ty = synthesizer.compile(&mut descriptor)?;
        assert_eq!(ty.fields().len(), 1);

        let instance = ty.create_instance(&[])?;
        instance.set("Name", "x")?;
        assert_eq!(instance.field("store")?, Value::from("x"));
        Ok(())
    }

    #[test]
    fn test_failed_compile_is_final() {
        let synthesizer = Synthesizer::with_default_host();
        let mut descriptor = TypeDescriptor::new("Broken");
        descriptor.add_member(FinalizerMember::new());

        assert!(matches!(
            synthesizer.compile(&mut descriptor),
            Err(Error::MissingMember { .. })
        ));
        assert!(matches!(descriptor.state(), CompileState::Failed));
        assert!(matches!(
            synthesizer.compile(&mut descriptor),
            Err(Error::DoubleCompilation(_))
        ));
    }

    #[test]
    fn test_method_without_body_returns_null() -> Result<()> {
        let synthesizer = Synthesizer::with_default_host();
        let mut descriptor = TypeDescriptor::new("Quiet");
        descriptor.add_member(MethodMember::new("Run", TypeSig::Void));

        synthesizer.compile(&mut descriptor)?;
        let instance = descriptor.create_instance(&[])?;
        assert_eq!(instance.invoke("Run", &[])?, Value::Null);
        Ok(())
    }

    #[test]
    fn test_dependency_cycle_rejected() {
        let synthesizer = Synthesizer::with_default_host();
        let mut descriptor = TypeDescriptor::new("Cycle");
        descriptor.add_member(
            MethodMember::new("A", TypeSig::Void).depends_on(Dependency::Method("B".into())),
        );
        descriptor.add_member(
            MethodMember::new("B", TypeSig::Void).depends_on(Dependency::Method("A".into())),
        );
        assert!(matches!(
            synthesizer.compile(&mut descriptor),
            Err(Error::InvalidDescriptor(_))
        ));
    }
}
