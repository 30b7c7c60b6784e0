//! # typeforge Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the typeforge library. Import this module to describe, compile, proxy and infer types
//! without spelling out module paths.
//!
//! ```rust
//! use typeforge::prelude::*;
//!
//! let synthesizer = Synthesizer::with_default_host();
//! let mut descriptor = TypeDescriptor::new("Point");
//! descriptor
//!     .add_member(PropertyMember::new("X", TypeSig::I4))
//!     .add_member(PropertyMember::new("Y", TypeSig::I4));
//! let point = synthesizer.compile(&mut descriptor)?;
//! assert_eq!(point.properties().len(), 2);
//! # Ok::<(), typeforge::Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all typeforge operations
pub use crate::Error;

/// The result type used throughout typeforge
pub use crate::Result;

/// Synthesis options
pub use crate::config::{NullabilityPolicy, SynthesisConfig};

/// Identity of synthesized types and members
pub use crate::token::Token;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Compiles type descriptors
pub use crate::synthesis::{NameGenerator, Synthesizer};

/// Builds forwarding proxies over foreign objects
pub use crate::proxy::{ProxyFactory, WrapperRegistry};

// ================================================================================================
// Type System
// ================================================================================================

/// Declared types and runtime values
pub use crate::typesystem::{TypeSig, Value};

/// Capabilities (interfaces) a synthesized type can implement
pub use crate::typesystem::{Capability, CapabilityBuilder, CapabilityRc, MethodSig, PropertySig};

/// The dynamic object protocol and foreign resource release
pub use crate::typesystem::{DynObject, ForeignRelease, InvokeRelease, ObjectRc, PropertyBag};

// ================================================================================================
// Descriptor Model
// ================================================================================================

/// Type descriptors and compile state
pub use crate::descriptor::{CompileState, TypeDescriptor};

/// Member descriptors
pub use crate::descriptor::{
    ConstructorMember, DetourMethodMember, DetourPropertyMember, DisposalMember, FieldMember,
    FinalizerMember, MemberDescriptor, MemberKind, MethodMember, PropertyMember,
};

/// Member details
pub use crate::descriptor::{
    BackingMode, DefaultValue, Dependency, FieldAttributes, MethodAttributes, OverrideTarget,
    ParameterDescriptor, PropertyStorage,
};

/// Metadata tags
pub use crate::descriptor::{
    AttributeDescriptor, AttributeInstance, AttributeParam, AttributeType, Literal,
};

// ================================================================================================
// Code Generation and Hosting
// ================================================================================================

/// Body generators and the scope they resolve against
pub use crate::codegen::{
    EmitScope, GetterBody, GetterGen, MethodBody, MethodGen, SetterBody, SetterGen, WrapFn,
};

/// Code hosts
pub use crate::host::{CodeHost, DefaultHost, TypeBuilder};

// ================================================================================================
// Runtime
// ================================================================================================

/// Compiled types and their instances
pub use crate::runtime::{CompiledType, CompiledTypeRc, Dispatch, Instance, InstanceRc};

// ================================================================================================
// Schema Inference
// ================================================================================================

/// Tabular data
pub use crate::schema::{
    infer_reader, load_record, reader_to_objects, ColumnSchema, DataReader, DataTable,
    TableReader,
};

/// Hierarchical documents
pub use crate::schema::{document_to_object, infer_document, json_to_object, xml_to_object, DocValue};

/// Pivoted records
pub use crate::schema::{infer_pivot, pivot, pivot_row, PivotSpec};
