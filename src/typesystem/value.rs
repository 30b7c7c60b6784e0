//! Runtime value representation for synthesized objects.

use std::{fmt, sync::Arc};

use crate::{
    runtime::Instance,
    typesystem::{ObjectRc, TypeSig},
    Error, Result,
};

/// Runtime value stored in a field slot or passed through an accessor.
///
/// # Type Mapping
///
/// | Declared type | Value variant |
/// |---------------|---------------|
/// | `int8`, `int16`, `int32`, `uint8`, `uint16` | [`Value::I32`] |
/// | `uint32` | [`Value::I32`], or [`Value::I64`] above `i32::MAX` |
/// | `int64`, `uint64` | [`Value::I64`] |
/// | `float32` | [`Value::F32`] |
/// | `float64` | [`Value::F64`] |
/// | `decimal` | [`Value::Decimal`] |
/// | `bool` | [`Value::Bool`] |
/// | `char` | [`Value::Char`] |
/// | `string` | [`Value::String`] |
/// | arrays | [`Value::Array`] |
/// | objects, capabilities, synthesized types | [`Value::Object`] |
/// | absence of a value | [`Value::Null`] |
///
/// Strings and arrays are immutable and shared, cloning a value never copies its payload.
/// Objects compare by identity.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absence of a value, also the result of `void` methods.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Character value.
    Char(char),

    /// 32-bit integer, also used for all narrower integers.
    I32(i32),

    /// 64-bit integer.
    I64(i64),

    /// 32-bit floating point.
    F32(f32),

    /// 64-bit floating point.
    F64(f64),

    /// Arbitrary-precision decimal number.
    ///
    /// Backed by [`serde_json::Number`] with the `arbitrary_precision` feature, so the digits of
    /// the source text are preserved exactly.
    Decimal(serde_json::Number),

    /// Immutable shared string.
    String(Arc<str>),

    /// Immutable shared array.
    Array(Arc<[Value]>),

    /// Reference to an object speaking the [`crate::typesystem::DynObject`] protocol.
    Object(ObjectRc),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean payload.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a 64-bit integer, if it is integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(value) => Some(i64::from(*value)),
            Value::I64(value) => Some(*value),
            Value::Decimal(number) => number.as_i64(),
            _ => None,
        }
    }

    /// Returns the value as a 64-bit float, if it is numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(value) => Some(f64::from(*value)),
            #[allow(clippy::cast_precision_loss)]
            Value::I64(value) => Some(*value as f64),
            Value::F32(value) => Some(f64::from(*value)),
            Value::F64(value) => Some(*value),
            Value::Decimal(number) => number.as_f64(),
            _ => None,
        }
    }

    /// Returns the string payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the array payload.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the object reference.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRc> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the synthesized instance behind this value, if there is one.
    #[must_use]
    pub fn as_instance(&self) -> Option<&Instance> {
        self.as_object().and_then(|object| object.as_instance())
    }

    /// Short kind name used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::I32(_) => "int32",
            Value::I64(_) => "int64",
            Value::F32(_) => "float32",
            Value::F64(_) => "float64",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Describes the value for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Object(object) => format!("object '{}'", object.type_name()),
            Value::Array(items) => format!("array of {}", items.len()),
            other => format!("{} '{}'", other.kind(), other),
        }
    }

    /// Converts this value to the declared type, the cast used when loading untyped records.
    ///
    /// `Null` becomes the type's [`TypeSig::default_value`]. Values already assignable are
    /// admitted unchanged; strings are parsed into scalars, numbers are converted between
    /// numeric kinds (with range checks), and anything can become a string.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] when no conversion applies or the value is out of range.
    pub fn coerce_to(&self, ty: &TypeSig) -> Result<Value> {
        if self.is_null() {
            return Ok(ty.default_value());
        }
        if ty.accepts(self) {
            return ty.admit(self.clone());
        }

        let mismatch = || Error::TypeMismatch {
            expected: ty.to_string(),
            found: self.describe(),
        };

        let converted = match ty.underlying() {
            TypeSig::String => Some(Value::String(Arc::from(self.to_string()))),
            TypeSig::Boolean => match self {
                Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                other => other.as_i64().map(|value| Value::Bool(value != 0)),
            },
            TypeSig::Char => match self {
                Value::String(text) => {
                    let mut chars = text.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(Value::Char(c)),
                        _ => None,
                    }
                }
                other => other
                    .as_i64()
                    .and_then(|value| u32::try_from(value).ok())
                    .and_then(char::from_u32)
                    .map(Value::Char),
            },
            TypeSig::I1 | TypeSig::U1 | TypeSig::I2 | TypeSig::U2 | TypeSig::I4 | TypeSig::U4 => {
                self.integral().and_then(|value| {
                    let narrowed = i32::try_from(value).map_or(Value::I64(value), Value::I32);
                    ty.underlying().accepts(&narrowed).then_some(narrowed)
                })
            }
            TypeSig::I8 | TypeSig::U8 => self
                .integral()
                .map(Value::I64)
                .filter(|value| ty.underlying().accepts(value)),
            #[allow(clippy::cast_possible_truncation)]
            TypeSig::R4 => self.numeric().map(|value| Value::F32(value as f32)),
            TypeSig::R8 => self.numeric().map(Value::F64),
            TypeSig::Decimal => match self {
                Value::String(text) => text.trim().parse::<serde_json::Number>().ok(),
                Value::F32(value) => serde_json::Number::from_f64(f64::from(*value)),
                Value::F64(value) => serde_json::Number::from_f64(*value),
                _ => None,
            }
            .map(Value::Decimal),
            _ => None,
        };

        converted.ok_or_else(mismatch)
    }

    fn integral(&self) -> Option<i64> {
        match self {
            Value::String(text) => text.trim().parse::<i64>().ok(),
            Value::Bool(value) => Some(i64::from(*value)),
            Value::Char(value) => Some(i64::from(u32::from(*value))),
            #[allow(clippy::cast_possible_truncation)]
            Value::F32(_) | Value::F64(_) => self.as_f64().map(|value| value.trunc() as i64),
            other => other.as_i64(),
        }
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            Value::String(text) => text.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Char(value) => write!(f, "{value}"),
            Value::I32(value) => write!(f, "{value}"),
            Value::I64(value) => write!(f, "{value}"),
            Value::F32(value) => write!(f, "{value}"),
            Value::F64(value) => write!(f, "{value}"),
            Value::Decimal(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "{value}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(object) => write!(f, "{}", object.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Char(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(Arc::from(value))
    }
}

impl From<ObjectRc> for Value {
    fn from(value: ObjectRc) -> Self {
        Value::Object(value)
    }
}

impl From<serde_json::Number> for Value {
    fn from(value: serde_json::Number) -> Self {
        Value::Decimal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::PropertyBag;

    #[test]
    fn test_null_displays_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from("x").to_string(), "x");
    }

    #[test]
    fn test_object_identity() {
        let a: ObjectRc = Arc::new(PropertyBag::new("Bag"));
        let b: ObjectRc = Arc::new(PropertyBag::new("Bag"));
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_coerce_null_to_default() -> Result<()> {
        assert_eq!(Value::Null.coerce_to(&TypeSig::I4)?, Value::I32(0));
        assert_eq!(Value::Null.coerce_to(&TypeSig::String)?, Value::Null);
        assert_eq!(Value::Null.coerce_to(&TypeSig::I4.to_nullable())?, Value::Null);
        Ok(())
    }

    #[test]
    fn test_coerce_strings() -> Result<()> {
        assert_eq!(Value::from("42").coerce_to(&TypeSig::I4)?, Value::I32(42));
        assert_eq!(Value::from("True").coerce_to(&TypeSig::Boolean)?, Value::Bool(true));
        assert_eq!(Value::from("2.5").coerce_to(&TypeSig::R8)?, Value::F64(2.5));
        assert_eq!(
            Value::from("12.5").coerce_to(&TypeSig::Decimal)?.as_f64(),
            Some(12.5)
        );
        assert_eq!(Value::I32(7).coerce_to(&TypeSig::String)?, Value::from("7"));
        Ok(())
    }

    #[test]
    fn test_coerce_range_checked() {
        assert!(Value::I32(300).coerce_to(&TypeSig::U1).is_err());
        assert!(Value::I64(i64::MAX).coerce_to(&TypeSig::I4).is_err());
        assert!(Value::from("abc").coerce_to(&TypeSig::I4).is_err());
    }

    #[test]
    fn test_coerce_unsigned_bounds() -> Result<()> {
        assert_eq!(
            Value::from("4294967295").coerce_to(&TypeSig::U4)?,
            Value::I64(i64::from(u32::MAX))
        );
        assert_eq!(Value::from("65535").coerce_to(&TypeSig::U2)?, Value::I32(65_535));
        assert!(Value::from("65536").coerce_to(&TypeSig::U2).is_err());
        assert!(Value::from("4294967296").coerce_to(&TypeSig::U4).is_err());
        assert!(Value::from("-1").coerce_to(&TypeSig::U4).is_err());
        assert!(Value::from("-1").coerce_to(&TypeSig::U8).is_err());
        assert!(Value::I32(40_000).coerce_to(&TypeSig::I2).is_err());
        Ok(())
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(Value::I32(3).as_i64(), Some(3));
        assert_eq!(Value::Decimal(serde_json::Number::from(9)).as_i64(), Some(9));
        assert_eq!(Value::from("3").as_i64(), None);
        assert_eq!(Value::F32(1.5).as_f64(), Some(1.5));
    }
}
