//! Compiled types, member handles and instances.
//!
//! This is what a [`crate::host::CodeHost`] produces when a type is sealed:
//!
//! - [`CompiledType`] - the immutable, instantiable type with its member tables and capability
//!   dispatch map
//! - [`FieldHandle`], [`PropertyHandle`], [`MethodHandle`], [`ConstructorHandle`] - resolved
//!   members that descriptors bind to
//! - [`Instance`] - one object, owning its slot storage and speaking
//!   [`crate::typesystem::DynObject`]
//!
//! # Examples
//!
//! ```rust
//! use typeforge::prelude::*;
//!
//! let synthesizer = Synthesizer::with_default_host();
//! let mut descriptor = TypeDescriptor::new("Point");
//! descriptor.add_member(PropertyMember::new("X", TypeSig::I4));
//! descriptor.add_member(PropertyMember::new("Y", TypeSig::I4));
//!
//! let point_type = synthesizer.compile(&mut descriptor)?;
//! let point = point_type.create_instance(&[])?;
//! point.set("X", 3)?;
//! assert_eq!(point.get("X")?, Value::I32(3));
//! assert_eq!(point.get("Y")?, Value::I32(0));
//! # Ok::<(), typeforge::Error>(())
//! ```

mod compiled;
mod handle;
mod instance;

pub use compiled::{CompiledType, CompiledTypeRc, Dispatch};
pub use handle::{
    ConstructorHandle, FieldHandle, FieldStorage, MemberRef, MethodHandle, PropertyHandle,
    StaticSlots,
};
pub use instance::{Instance, InstanceRc};
