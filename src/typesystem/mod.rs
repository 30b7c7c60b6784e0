//! Declared types, runtime values and the dynamic object protocol.
//!
//! Everything a synthesized type talks about lives here:
//!
//! - [`TypeSig`] - the declared type of a field, property, parameter or return value
//! - [`Value`] - a dynamically typed runtime value
//! - [`Capability`] - an interface a synthesized type can be asked to satisfy
//! - [`DynObject`] - the protocol every object speaks, whether it was synthesized by this crate
//!   or supplied by the caller as a foreign object
//! - [`ForeignRelease`] - the collaborator that releases a wrapped foreign resource
//!
//! # Assignability
//!
//! [`TypeSig::admit`] is the single place that decides whether a value fits a declared type.
//! Admission only ever widens losslessly (an `I32` into an `int64` slot, an integer into a
//! `Decimal` slot). Lossy conversions are the business of [`Value::coerce_to`], which the
//! schema loaders use when reading untyped input.

mod capability;
mod object;
mod value;

pub use capability::{Capability, CapabilityBuilder, CapabilityRc, MethodSig, PropertySig};
pub use object::{DynObject, ForeignRelease, InvokeRelease, ObjectRc, PropertyBag};
pub use value::Value;

use std::fmt;

use crate::{runtime::CompiledTypeRc, Error, Result};

/// The declared type of a member slot.
///
/// Scalars follow the primitive set of the common type system. Reference-like shapes
/// (`Capability`, `Class`) carry the interface or the previously synthesized type they refer to.
#[derive(Clone)]
pub enum TypeSig {
    /// No value, only valid as a method return type
    Void,
    /// `bool`
    Boolean,
    /// UTF-16 code unit, represented as a Rust `char`
    Char,
    /// `int8`
    I1,
    /// `uint8`
    U1,
    /// `int16`
    I2,
    /// `uint16`
    U2,
    /// `int32`
    I4,
    /// `uint32`
    U4,
    /// `int64`
    I8,
    /// `uint64`
    U8,
    /// `float32`
    R4,
    /// `float64`
    R8,
    /// Arbitrary-precision decimal number
    Decimal,
    /// Immutable string
    String,
    /// Untyped slot accepting any value
    Object,
    /// A value type that additionally admits `Null`
    Nullable(Box<TypeSig>),
    /// Array of the element type
    Array(Box<TypeSig>),
    /// Any object implementing the capability
    Capability(CapabilityRc),
    /// Instances of a synthesized type (or types derived from it)
    Class(CompiledTypeRc),
}

impl TypeSig {
    /// Returns `true` for value types.
    ///
    /// Every scalar except `String` and `Object` is a value type, and so is `Nullable`.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        !matches!(
            self,
            TypeSig::Void
                | TypeSig::String
                | TypeSig::Object
                | TypeSig::Array(_)
                | TypeSig::Capability(_)
                | TypeSig::Class(_)
        )
    }

    /// Returns `true` if `Null` is a legal value of this type.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeSig::Nullable(_)) || !self.is_value_type()
    }

    /// Wraps value types in [`TypeSig::Nullable`], everything else is returned unchanged.
    #[must_use]
    pub fn to_nullable(&self) -> TypeSig {
        if self.is_nullable() {
            self.clone()
        } else {
            TypeSig::Nullable(Box::new(self.clone()))
        }
    }

    /// Strips one [`TypeSig::Nullable`] layer.
    #[must_use]
    pub fn underlying(&self) -> &TypeSig {
        match self {
            TypeSig::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Returns the capability this type refers to, if it is a capability type.
    #[must_use]
    pub fn capability(&self) -> Option<&CapabilityRc> {
        match self {
            TypeSig::Capability(capability) => Some(capability),
            _ => None,
        }
    }

    /// The type-appropriate empty value.
    ///
    /// Zero, `false` or `'\0'` for value types, `Null` for everything nullable.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            TypeSig::Boolean => Value::Bool(false),
            TypeSig::Char => Value::Char('\0'),
            TypeSig::I1 | TypeSig::U1 | TypeSig::I2 | TypeSig::U2 | TypeSig::I4 | TypeSig::U4 => {
                Value::I32(0)
            }
            TypeSig::I8 | TypeSig::U8 => Value::I64(0),
            TypeSig::R4 => Value::F32(0.0),
            TypeSig::R8 => Value::F64(0.0),
            TypeSig::Decimal => Value::Decimal(serde_json::Number::from(0)),
            _ => Value::Null,
        }
    }

    /// Checks whether `value` is assignable to this type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeSig::Object, _) => true,
            (TypeSig::Nullable(_), Value::Null) => true,
            (TypeSig::Nullable(inner), other) => inner.accepts(other),
            (_, Value::Null) => !self.is_value_type() && !matches!(self, TypeSig::Void),
            (TypeSig::Boolean, Value::Bool(_))
            | (TypeSig::Char, Value::Char(_))
            | (TypeSig::R4, Value::F32(_))
            | (TypeSig::R8, Value::F32(_) | Value::F64(_))
            | (TypeSig::Decimal, Value::Decimal(_) | Value::I32(_) | Value::I64(_))
            | (TypeSig::String, Value::String(_)) => true,
            (TypeSig::I4, Value::I32(_)) => true,
            (TypeSig::I1, Value::I32(v)) => i8::try_from(*v).is_ok(),
            (TypeSig::U1, Value::I32(v)) => u8::try_from(*v).is_ok(),
            (TypeSig::I2, Value::I32(v)) => i16::try_from(*v).is_ok(),
            (TypeSig::U2, Value::I32(v)) => u16::try_from(*v).is_ok(),
            (TypeSig::U4, Value::I32(v)) => u32::try_from(*v).is_ok(),
            (TypeSig::U4, Value::I64(v)) => u32::try_from(*v).is_ok(),
            (TypeSig::I8, Value::I32(_) | Value::I64(_)) => true,
            (TypeSig::U8, Value::I32(v)) => *v >= 0,
            (TypeSig::U8, Value::I64(v)) => *v >= 0,
            (TypeSig::Array(element), Value::Array(items)) => {
                items.iter().all(|item| element.accepts(item))
            }
            (TypeSig::Capability(capability), Value::Object(object)) => {
                object.implements(capability.name())
            }
            (TypeSig::Class(ty), Value::Object(object)) => object
                .as_instance()
                .is_some_and(|instance| instance.compiled_type().is_assignable_to(ty)),
            _ => false,
        }
    }

    /// Admits `value` into a slot of this type, widening it losslessly where needed.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] if the value is not assignable.
    pub fn admit(&self, value: Value) -> Result<Value> {
        if !self.accepts(&value) {
            return Err(Error::TypeMismatch {
                expected: self.to_string(),
                found: value.describe(),
            });
        }

        Ok(match (self.underlying(), value) {
            (TypeSig::I8 | TypeSig::U8, Value::I32(v)) => Value::I64(i64::from(v)),
            (TypeSig::U4, Value::I64(v)) => i32::try_from(v).map_or(Value::I64(v), Value::I32),
            (TypeSig::R8, Value::F32(v)) => Value::F64(f64::from(v)),
            (TypeSig::Decimal, Value::I32(v)) => Value::Decimal(serde_json::Number::from(v)),
            (TypeSig::Decimal, Value::I64(v)) => Value::Decimal(serde_json::Number::from(v)),
            (_, value) => value,
        })
    }
}

impl PartialEq for TypeSig {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeSig::Nullable(a), TypeSig::Nullable(b)) | (TypeSig::Array(a), TypeSig::Array(b)) => {
                a == b
            }
            (TypeSig::Capability(a), TypeSig::Capability(b)) => a.name() == b.name(),
            (TypeSig::Class(a), TypeSig::Class(b)) => a.token() == b.token(),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Void => write!(f, "void"),
            TypeSig::Boolean => write!(f, "bool"),
            TypeSig::Char => write!(f, "char"),
            TypeSig::I1 => write!(f, "sbyte"),
            TypeSig::U1 => write!(f, "byte"),
            TypeSig::I2 => write!(f, "short"),
            TypeSig::U2 => write!(f, "ushort"),
            TypeSig::I4 => write!(f, "int"),
            TypeSig::U4 => write!(f, "uint"),
            TypeSig::I8 => write!(f, "long"),
            TypeSig::U8 => write!(f, "ulong"),
            TypeSig::R4 => write!(f, "float"),
            TypeSig::R8 => write!(f, "double"),
            TypeSig::Decimal => write!(f, "decimal"),
            TypeSig::String => write!(f, "string"),
            TypeSig::Object => write!(f, "object"),
            TypeSig::Nullable(inner) => write!(f, "{inner}?"),
            TypeSig::Array(inner) => write!(f, "{inner}[]"),
            TypeSig::Capability(capability) => write!(f, "{}", capability.name()),
            TypeSig::Class(ty) => write!(f, "{}", ty.name()),
        }
    }
}

impl fmt::Debug for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeSig({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_classification() {
        assert!(TypeSig::I4.is_value_type());
        assert!(TypeSig::Decimal.is_value_type());
        assert!(TypeSig::Nullable(Box::new(TypeSig::I4)).is_value_type());
        assert!(!TypeSig::String.is_value_type());
        assert!(!TypeSig::Object.is_value_type());
        assert!(!TypeSig::Array(Box::new(TypeSig::I4)).is_value_type());
    }

    #[test]
    fn test_to_nullable() {
        assert_eq!(
            TypeSig::I4.to_nullable(),
            TypeSig::Nullable(Box::new(TypeSig::I4))
        );
        assert_eq!(TypeSig::String.to_nullable(), TypeSig::String);
        let nullable = TypeSig::Boolean.to_nullable();
        assert_eq!(nullable.to_nullable(), nullable);
    }

    #[test]
    fn test_default_values() {
        assert_eq!(TypeSig::Boolean.default_value(), Value::Bool(false));
        assert_eq!(TypeSig::I2.default_value(), Value::I32(0));
        assert_eq!(TypeSig::U8.default_value(), Value::I64(0));
        assert_eq!(TypeSig::String.default_value(), Value::Null);
        assert_eq!(TypeSig::I4.to_nullable().default_value(), Value::Null);
    }

    #[test]
    fn test_accepts() {
        assert!(TypeSig::I4.accepts(&Value::I32(5)));
        assert!(!TypeSig::I4.accepts(&Value::Null));
        assert!(TypeSig::I4.to_nullable().accepts(&Value::Null));
        assert!(TypeSig::String.accepts(&Value::Null));
        assert!(!TypeSig::String.accepts(&Value::I32(1)));
        assert!(TypeSig::U1.accepts(&Value::I32(255)));
        assert!(!TypeSig::U1.accepts(&Value::I32(256)));
        assert!(TypeSig::Object.accepts(&Value::from("anything")));

        let array = TypeSig::Array(Box::new(TypeSig::String));
        assert!(array.accepts(&Value::from(vec![Value::from("a"), Value::Null])));
        assert!(!array.accepts(&Value::from(vec![Value::I32(1)])));
    }

    #[test]
    fn test_accepts_integer_ranges() {
        assert!(TypeSig::I1.accepts(&Value::I32(-128)));
        assert!(!TypeSig::I1.accepts(&Value::I32(128)));
        assert!(!TypeSig::U1.accepts(&Value::I32(-1)));

        assert!(TypeSig::I2.accepts(&Value::I32(i32::from(i16::MIN))));
        assert!(TypeSig::I2.accepts(&Value::I32(i32::from(i16::MAX))));
        assert!(!TypeSig::I2.accepts(&Value::I32(32_768)));
        assert!(!TypeSig::I2.accepts(&Value::I32(-32_769)));

        assert!(TypeSig::U2.accepts(&Value::I32(65_535)));
        assert!(!TypeSig::U2.accepts(&Value::I32(65_536)));
        assert!(!TypeSig::U2.accepts(&Value::I32(-1)));

        assert!(TypeSig::U4.accepts(&Value::I32(i32::MAX)));
        assert!(!TypeSig::U4.accepts(&Value::I32(-1)));
        assert!(TypeSig::U4.accepts(&Value::I64(i64::from(u32::MAX))));
        assert!(!TypeSig::U4.accepts(&Value::I64(i64::from(u32::MAX) + 1)));
        assert!(!TypeSig::U4.accepts(&Value::I64(-1)));

        assert!(TypeSig::U8.accepts(&Value::I64(i64::MAX)));
        assert!(!TypeSig::U8.accepts(&Value::I64(-1)));
        assert!(!TypeSig::U8.accepts(&Value::I32(-1)));
        assert!(TypeSig::I8.accepts(&Value::I64(-1)));
    }

    #[test]
    fn test_admit_uint32() -> Result<()> {
        let max = i64::from(u32::MAX);
        assert_eq!(TypeSig::U4.admit(Value::I64(max))?, Value::I64(max));
        assert_eq!(TypeSig::U4.admit(Value::I64(12))?, Value::I32(12));
        assert!(TypeSig::U4.to_nullable().admit(Value::I32(-5)).is_err());
        Ok(())
    }

    #[test]
    fn test_admit_widens() -> Result<()> {
        assert_eq!(TypeSig::I8.admit(Value::I32(7))?, Value::I64(7));
        assert_eq!(TypeSig::R8.admit(Value::F32(0.5))?, Value::F64(0.5));
        assert_eq!(TypeSig::Decimal.admit(Value::I32(3))?.as_i64(), Some(3));

        match TypeSig::Boolean.admit(Value::from("yes")) {
            Err(Error::TypeMismatch { expected, .. }) => assert_eq!(expected, "bool"),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeSig::I4.to_nullable().to_string(), "int?");
        assert_eq!(TypeSig::Array(Box::new(TypeSig::String)).to_string(), "string[]");
    }
}
