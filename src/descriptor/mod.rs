//! The descriptor model: declarative descriptions of types and members to synthesize.
//!
//! Descriptors are plain data. They are authored and attached to a [`TypeDescriptor`], handed
//! to the [`crate::synthesis::Synthesizer`] for a one-shot compile, and afterwards bound to
//! the compiled handles so they can be used as typed accessors.
//!
//! # Member Kinds
//!
//! | Kind | Descriptor | Notes |
//! |------|------------|-------|
//! | Field | [`FieldMember`] | plain storage slot |
//! | Property | [`PropertyMember`] | owns an implicit backing field unless told otherwise |
//! | Method | [`MethodMember`] | body strategy, empty body returns `Null` |
//! | Constructor | [`ConstructorMember`] | instance constructor or static initializer |
//! | Detour method | [`DetourMethodMember`] | forwards to a wrapped target |
//! | Detour property | [`DetourPropertyMember`] | forwards, optionally wraps and memoizes |
//! | Disposal | [`DisposalMember`] | idempotent `Dispose` with cascade |
//! | Finalizer | [`FinalizerMember`] | delegates to the disposal member |
//!
//! # Construction-Time Validation
//!
//! Some combinations are rejected when the descriptor is built, before synthesis ever runs:
//! indexers requesting implicit backing storage ([`crate::Error::IndexedMemberConflict`]),
//! static constructors with parameters and detour members over a capability that does not
//! expose the forwarded member.
//!
//! # Ordering
//!
//! Member order matters only for override and name disambiguation. Members that depend on
//! others (a property on its backing field, a finalizer on the disposal method) report
//! [`Dependency`] entries, and the synthesis engine defines dependencies first.

mod attribute;
mod constructor;
mod detour;
mod disposal;
mod field;
mod method;
mod parameter;
mod property;
mod typedef;

pub use attribute::{AttributeDescriptor, AttributeInstance, AttributeParam, AttributeType, Literal};
pub use constructor::ConstructorMember;
pub use detour::{DetourMethodMember, DetourPropertyMember};
pub use disposal::{DisposalMember, FinalizerMember};
pub use field::FieldMember;
pub use method::MethodMember;
pub use parameter::{DefaultValue, ParameterDescriptor};
pub use property::{BackingMode, PropertyMember, PropertyStorage};
pub use typedef::{CompileState, TypeDescriptor};

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter};

use crate::{
    config::SynthesisConfig,
    token::Token,
    typesystem::{CapabilityRc, TypeSig},
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field flags
    pub struct FieldAttributes: u32 {
        /// Field is private to the type
        const PRIVATE = 0x0001;
        /// Field is accessible everywhere
        const PUBLIC = 0x0006;
        /// Field belongs to the type, not to instances
        const STATIC = 0x0010;
        /// Field is assigned only during construction
        const INIT_ONLY = 0x0020;
        /// Field was generated by the synthesis engine
        const COMPILER_GENERATED = 0x0400;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method flags
    pub struct MethodAttributes: u32 {
        /// Method is private to the type
        const PRIVATE = 0x0001;
        /// Method is accessible everywhere
        const PUBLIC = 0x0006;
        /// Method belongs to the type
        const STATIC = 0x0010;
        /// Method cannot be overridden further
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method has a special name (accessors, constructors)
        const SPECIAL_NAME = 0x0800;
    }
}

impl Default for FieldAttributes {
    fn default() -> Self {
        FieldAttributes::PRIVATE
    }
}

impl Default for MethodAttributes {
    fn default() -> Self {
        MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG
    }
}

/// The kind of a [`MemberDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum MemberKind {
    /// [`FieldMember`]
    Field,
    /// [`PropertyMember`]
    Property,
    /// [`MethodMember`]
    Method,
    /// [`ConstructorMember`]
    Constructor,
    /// [`DetourMethodMember`]
    DetourMethod,
    /// [`DetourPropertyMember`]
    DetourProperty,
    /// [`DisposalMember`]
    Disposal,
    /// [`FinalizerMember`]
    Finalizer,
}

/// The member a descriptor satisfies.
#[derive(Debug, Clone)]
pub enum OverrideTarget {
    /// The same-named member of a capability (or one it inherits)
    Capability(CapabilityRc),
    /// The same-named member of the base type
    Base,
}

/// A sibling member that has to be defined before the dependent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// A field by name
    Field(String),
    /// A property by name
    Property(String),
    /// A method by name
    Method(String),
}

/// One member of a [`TypeDescriptor`].
#[derive(Debug)]
pub enum MemberDescriptor {
    /// A field
    Field(FieldMember),
    /// A property
    Property(PropertyMember),
    /// A method
    Method(MethodMember),
    /// A constructor or static initializer
    Constructor(ConstructorMember),
    /// A forwarding method
    DetourMethod(DetourMethodMember),
    /// A forwarding property
    DetourProperty(DetourPropertyMember),
    /// A disposal method
    Disposal(DisposalMember),
    /// A finalizer
    Finalizer(FinalizerMember),
}

impl MemberDescriptor {
    /// The member kind.
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        match self {
            MemberDescriptor::Field(_) => MemberKind::Field,
            MemberDescriptor::Property(_) => MemberKind::Property,
            MemberDescriptor::Method(_) => MemberKind::Method,
            MemberDescriptor::Constructor(_) => MemberKind::Constructor,
            MemberDescriptor::DetourMethod(_) => MemberKind::DetourMethod,
            MemberDescriptor::DetourProperty(_) => MemberKind::DetourProperty,
            MemberDescriptor::Disposal(_) => MemberKind::Disposal,
            MemberDescriptor::Finalizer(_) => MemberKind::Finalizer,
        }
    }

    /// The member name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            MemberDescriptor::Field(m) => m.name(),
            MemberDescriptor::Property(m) => m.name(),
            MemberDescriptor::Method(m) => m.name(),
            MemberDescriptor::Constructor(m) => m.name(),
            MemberDescriptor::DetourMethod(m) => m.method().name(),
            MemberDescriptor::DetourProperty(m) => m.property().name(),
            MemberDescriptor::Disposal(m) => m.method().name(),
            MemberDescriptor::Finalizer(m) => m.name(),
        }
    }

    /// The declared value type: storage, property or return type.
    #[must_use]
    pub fn value_type(&self) -> TypeSig {
        match self {
            MemberDescriptor::Field(m) => m.ty().clone(),
            MemberDescriptor::Property(m) => m.ty().clone(),
            MemberDescriptor::Method(m) => m.return_type().clone(),
            MemberDescriptor::DetourMethod(m) => m.method().return_type().clone(),
            MemberDescriptor::DetourProperty(m) => m.property().ty().clone(),
            MemberDescriptor::Constructor(_)
            | MemberDescriptor::Disposal(_)
            | MemberDescriptor::Finalizer(_) => TypeSig::Void,
        }
    }

    /// Returns `true` once the member has been defined on a code host.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        match self {
            MemberDescriptor::Field(m) => m.defined,
            MemberDescriptor::Property(m) => m.defined,
            MemberDescriptor::Method(m) => m.defined,
            MemberDescriptor::Constructor(m) => m.defined,
            MemberDescriptor::DetourMethod(m) => m.method.defined,
            MemberDescriptor::DetourProperty(m) => m.property.defined,
            MemberDescriptor::Disposal(m) => m.method.defined,
            MemberDescriptor::Finalizer(m) => m.defined,
        }
    }

    /// The token assigned when the member was defined.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match self {
            MemberDescriptor::Field(m) => m.token,
            MemberDescriptor::Property(m) => m.token,
            MemberDescriptor::Method(m) => m.token,
            MemberDescriptor::Constructor(m) => m.token,
            MemberDescriptor::DetourMethod(m) => m.method.token,
            MemberDescriptor::DetourProperty(m) => m.property.token,
            MemberDescriptor::Disposal(m) => m.method.token,
            MemberDescriptor::Finalizer(m) => m.token,
        }
    }

    /// The capability or base members this member satisfies.
    #[must_use]
    pub fn overrides(&self) -> &[OverrideTarget] {
        match self {
            MemberDescriptor::Property(m) => &m.overrides,
            MemberDescriptor::Method(m) => &m.overrides,
            MemberDescriptor::DetourMethod(m) => &m.method.overrides,
            MemberDescriptor::DetourProperty(m) => &m.property.overrides,
            MemberDescriptor::Disposal(m) => &m.method.overrides,
            _ => &[],
        }
    }

    /// Metadata attached to the member.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        match self {
            MemberDescriptor::Field(m) => &m.attributes,
            MemberDescriptor::Property(m) => &m.attributes,
            MemberDescriptor::Method(m) => &m.attributes,
            MemberDescriptor::DetourMethod(m) => &m.method.attributes,
            MemberDescriptor::DetourProperty(m) => &m.property.attributes,
            MemberDescriptor::Disposal(m) => &m.method.attributes,
            MemberDescriptor::Constructor(_) | MemberDescriptor::Finalizer(_) => &[],
        }
    }

    /// Siblings that must be defined before this member.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Dependency> {
        match self {
            MemberDescriptor::Field(_) => Vec::new(),
            MemberDescriptor::Property(m) => m.dependencies(),
            MemberDescriptor::Method(m) => m.depends_on.clone(),
            MemberDescriptor::Constructor(m) => m.depends_on.clone(),
            MemberDescriptor::DetourMethod(m) => m.dependencies(),
            MemberDescriptor::DetourProperty(m) => m.dependencies(),
            MemberDescriptor::Disposal(m) => m.dependencies(),
            MemberDescriptor::Finalizer(m) => vec![Dependency::Method(m.disposal_method.clone())],
        }
    }

    /// Returns `true` if this member satisfies `dependency`.
    #[must_use]
    pub fn satisfies(&self, dependency: &Dependency) -> bool {
        match (dependency, self) {
            (Dependency::Field(name), MemberDescriptor::Field(m)) => m.name() == name,
            (
                Dependency::Property(name),
                MemberDescriptor::Property(_) | MemberDescriptor::DetourProperty(_),
            )
            | (
                Dependency::Method(name),
                MemberDescriptor::Method(_)
                | MemberDescriptor::DetourMethod(_)
                | MemberDescriptor::Disposal(_),
            ) => self.name() == name,
            _ => false,
        }
    }

    /// Resolves names that depend on configuration and returns the auxiliary fields the member
    /// needs (implicit backing field, wrapper cache, disposed flag).
    ///
    /// Called once per member before the Define phase. The engine adds every returned field
    /// that does not already exist by name.
    pub(crate) fn prepare(&mut self, config: &SynthesisConfig) -> Vec<FieldMember> {
        match self {
            MemberDescriptor::Property(m) => m.prepare(config).into_iter().collect(),
            MemberDescriptor::DetourProperty(m) => m.prepare().into_iter().collect(),
            MemberDescriptor::Disposal(m) => vec![m.prepare(config)],
            _ => Vec::new(),
        }
    }
}

impl From<FieldMember> for MemberDescriptor {
    fn from(member: FieldMember) -> Self {
        MemberDescriptor::Field(member)
    }
}

impl From<PropertyMember> for MemberDescriptor {
    fn from(member: PropertyMember) -> Self {
        MemberDescriptor::Property(member)
    }
}

impl From<MethodMember> for MemberDescriptor {
    fn from(member: MethodMember) -> Self {
        MemberDescriptor::Method(member)
    }
}

impl From<ConstructorMember> for MemberDescriptor {
    fn from(member: ConstructorMember) -> Self {
        MemberDescriptor::Constructor(member)
    }
}

impl From<DetourMethodMember> for MemberDescriptor {
    fn from(member: DetourMethodMember) -> Self {
        MemberDescriptor::DetourMethod(member)
    }
}

impl From<DetourPropertyMember> for MemberDescriptor {
    fn from(member: DetourPropertyMember) -> Self {
        MemberDescriptor::DetourProperty(member)
    }
}

impl From<DisposalMember> for MemberDescriptor {
    fn from(member: DisposalMember) -> Self {
        MemberDescriptor::Disposal(member)
    }
}

impl From<FinalizerMember> for MemberDescriptor {
    fn from(member: FinalizerMember) -> Self {
        MemberDescriptor::Finalizer(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_member_kind_display() {
        assert_eq!(MemberKind::DetourProperty.to_string(), "DetourProperty");
        assert_eq!(MemberKind::iter().count(), MemberKind::COUNT);
        assert_eq!(MemberKind::COUNT, 8);
    }

    #[test]
    fn test_descriptor_accessors() {
        let member: MemberDescriptor = PropertyMember::new("Name", TypeSig::String).into();
        assert_eq!(member.kind(), MemberKind::Property);
        assert_eq!(member.name(), "Name");
        assert_eq!(member.value_type(), TypeSig::String);
        assert!(!member.is_defined());
        assert!(member.token().is_none());
    }

    #[test]
    fn test_dependency_matching() {
        let field: MemberDescriptor = FieldMember::new("m_Name", TypeSig::String).into();
        assert!(field.satisfies(&Dependency::Field("m_Name".into())));
        assert!(!field.satisfies(&Dependency::Property("m_Name".into())));

        let dispose: MemberDescriptor = DisposalMember::new("source").into();
        assert!(dispose.satisfies(&Dependency::Method("Dispose".into())));

        let finalizer: MemberDescriptor = FinalizerMember::new().into();
        assert_eq!(
            finalizer.dependencies(),
            vec![Dependency::Method("Dispose".into())]
        );
    }

    #[test]
    fn test_default_flags() {
        assert_eq!(FieldAttributes::default(), FieldAttributes::PRIVATE);
        assert!(MethodAttributes::default().contains(MethodAttributes::PUBLIC));
    }
}
