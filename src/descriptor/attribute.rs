//! Metadata tags attached to synthesized types and members.
//!
//! An [`AttributeType`] declares one or more constructors. An [`AttributeDescriptor`] pairs the
//! type with literal arguments and selects the constructor at construction time: a constructor
//! matches when it takes at least as many parameters as arguments were supplied, every
//! non-null argument is accepted by its parameter, and every omitted (or null) argument has a
//! parameter default. Exactly one constructor has to match.
//!
//! Literals are embedded by the code host when the owning member is defined; the host may
//! refuse literals it cannot represent as constants.

use std::sync::{Arc, OnceLock};

use crate::{
    typesystem::{TypeSig, Value},
    Error, Result,
};

/// A constant that can be embedded into metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Null reference
    Null,
    /// Boolean constant
    Bool(bool),
    /// Character constant
    Char(char),
    /// 32-bit integer constant
    I32(i32),
    /// 64-bit integer constant
    I64(i64),
    /// Floating point constant
    F64(f64),
    /// String constant
    String(String),
    /// Reference to a type by name
    TypeName(String),
    /// Arbitrary-precision decimal, not embeddable by every host
    Decimal(serde_json::Number),
}

impl Literal {
    /// Returns `true` if a parameter of type `ty` accepts this literal.
    #[must_use]
    pub fn fits(&self, ty: &TypeSig) -> bool {
        match (self, ty.underlying()) {
            (_, TypeSig::Object) => true,
            (Literal::Null, _) => ty.is_nullable(),
            (Literal::Bool(_), TypeSig::Boolean)
            | (Literal::Char(_), TypeSig::Char)
            | (Literal::I64(_), TypeSig::I8 | TypeSig::U8)
            | (Literal::F64(_), TypeSig::R4 | TypeSig::R8)
            | (Literal::String(_) | Literal::TypeName(_), TypeSig::String)
            | (Literal::Decimal(_), TypeSig::Decimal) => true,
            (Literal::I32(_), underlying) => {
                matches!(
                    underlying,
                    TypeSig::I1
                        | TypeSig::U1
                        | TypeSig::I2
                        | TypeSig::U2
                        | TypeSig::I4
                        | TypeSig::U4
                        | TypeSig::I8
                        | TypeSig::U8
                )
            }
            _ => false,
        }
    }

    /// Converts the literal into a runtime value, if it has a constant representation.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedLiteral`] for decimals.
    pub fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Literal::Null => Value::Null,
            Literal::Bool(value) => Value::Bool(*value),
            Literal::Char(value) => Value::Char(*value),
            Literal::I32(value) => Value::I32(*value),
            Literal::I64(value) => Value::I64(*value),
            Literal::F64(value) => Value::F64(*value),
            Literal::String(value) | Literal::TypeName(value) => Value::from(value.as_str()),
            Literal::Decimal(value) => {
                return Err(Error::UnsupportedLiteral(format!("decimal {value}")))
            }
        })
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::I32(value)
    }
}

/// One parameter of an attribute constructor.
#[derive(Debug, Clone)]
pub struct AttributeParam {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeSig,
    /// Value used when the argument is omitted or null
    pub default: Option<Literal>,
}

impl AttributeParam {
    /// A required parameter.
    pub fn required(name: impl Into<String>, ty: TypeSig) -> Self {
        AttributeParam {
            name: name.into(),
            ty,
            default: None,
        }
    }

    /// An optional parameter with a default.
    pub fn optional(name: impl Into<String>, ty: TypeSig, default: Literal) -> Self {
        AttributeParam {
            name: name.into(),
            ty,
            default: Some(default),
        }
    }
}

/// An attribute type and its constructors.
#[derive(Debug)]
pub struct AttributeType {
    name: String,
    constructors: Vec<Vec<AttributeParam>>,
}

impl AttributeType {
    /// Declares an attribute type.
    pub fn new(name: impl Into<String>, constructors: Vec<Vec<AttributeParam>>) -> Arc<Self> {
        Arc::new(AttributeType {
            name: name.into(),
            constructors,
        })
    }

    /// Attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constructor parameter lists.
    #[must_use]
    pub fn constructors(&self) -> &[Vec<AttributeParam>] {
        &self.constructors
    }

    /// `ColumnInfo(name, value)`: one piece of source schema metadata on an inferred member.
    #[must_use]
    pub fn column_info() -> Arc<Self> {
        static TYPE: OnceLock<Arc<AttributeType>> = OnceLock::new();
        TYPE.get_or_init(|| {
            AttributeType::new(
                "ColumnInfo",
                vec![vec![
                    AttributeParam::required("name", TypeSig::String),
                    AttributeParam::optional("value", TypeSig::String, Literal::Null),
                ]],
            )
        })
        .clone()
    }

    /// `DebuggerDisplay(format)`: how debuggers render an instance.
    #[must_use]
    pub fn debugger_display() -> Arc<Self> {
        static TYPE: OnceLock<Arc<AttributeType>> = OnceLock::new();
        TYPE.get_or_init(|| {
            AttributeType::new(
                "DebuggerDisplay",
                vec![vec![AttributeParam::required("format", TypeSig::String)]],
            )
        })
        .clone()
    }

    /// `DefaultMember(name)`: the member used for indexed access.
    #[must_use]
    pub fn default_member() -> Arc<Self> {
        static TYPE: OnceLock<Arc<AttributeType>> = OnceLock::new();
        TYPE.get_or_init(|| {
            AttributeType::new(
                "DefaultMember",
                vec![vec![AttributeParam::required("name", TypeSig::String)]],
            )
        })
        .clone()
    }
}

/// An attribute type applied with concrete arguments.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    ty: Arc<AttributeType>,
    constructor: usize,
    args: Vec<Literal>,
}

impl AttributeDescriptor {
    /// Binds `args` to exactly one constructor of `ty`.
    ///
    /// # Errors
    /// Returns [`Error::AmbiguousDescriptor`] if several constructors match and
    /// [`Error::MissingMember`] if none does.
    pub fn new(ty: &Arc<AttributeType>, args: Vec<Literal>) -> Result<Self> {
        let matching: Vec<usize> = ty
            .constructors
            .iter()
            .enumerate()
            .filter(|(_, params)| Self::matches(params, &args))
            .map(|(i, _)| i)
            .collect();

        match matching.as_slice() {
            [constructor] => {
                let params = &ty.constructors[*constructor];
                let args = params
                    .iter()
                    .enumerate()
                    .map(|(i, param)| match (args.get(i), &param.default) {
                        (Some(Literal::Null) | None, Some(default)) => default.clone(),
                        (Some(arg), _) => arg.clone(),
                        (None, None) => Literal::Null,
                    })
                    .collect();
                Ok(AttributeDescriptor {
                    ty: ty.clone(),
                    constructor: *constructor,
                    args,
                })
            }
            [] => Err(Error::missing(
                ty.name(),
                format!(".ctor({} arguments)", args.len()),
            )),
            candidates => Err(Error::AmbiguousDescriptor {
                member: ty.name().to_string(),
                candidates: candidates.len(),
            }),
        }
    }

    fn matches(params: &[AttributeParam], args: &[Literal]) -> bool {
        params.len() >= args.len()
            && params.iter().enumerate().all(|(i, param)| match args.get(i) {
                Some(Literal::Null) => param.default.is_some() || param.ty.is_nullable(),
                Some(arg) => arg.fits(&param.ty),
                None => param.default.is_some(),
            })
    }

    /// A `ColumnInfo` tag.
    ///
    /// # Errors
    /// Never fails for the built-in type; the signature is shared with [`Self::new`].
    pub fn column_info(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        Self::new(
            &AttributeType::column_info(),
            vec![Literal::String(name.into()), Literal::String(value.into())],
        )
    }

    /// The attribute type.
    #[must_use]
    pub fn attribute_type(&self) -> &Arc<AttributeType> {
        &self.ty
    }

    /// Index of the selected constructor.
    #[must_use]
    pub fn constructor(&self) -> usize {
        self.constructor
    }

    /// Arguments, with defaults filled in.
    #[must_use]
    pub fn args(&self) -> &[Literal] {
        &self.args
    }
}

/// An attribute as embedded by the code host.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInstance {
    /// Attribute type name
    pub name: String,
    /// Embedded argument values
    pub args: Vec<Value>,
}

impl AttributeInstance {
    /// The argument at `index` as a string.
    #[must_use]
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overloaded() -> Arc<AttributeType> {
        AttributeType::new(
            "Overloaded",
            vec![
                vec![AttributeParam::required("text", TypeSig::String)],
                vec![
                    AttributeParam::required("count", TypeSig::I4),
                    AttributeParam::optional("flag", TypeSig::Boolean, Literal::Bool(false)),
                ],
                vec![
                    AttributeParam::required("text", TypeSig::String),
                    AttributeParam::required("count", TypeSig::I4),
                ],
            ],
        )
    }

    #[test]
    fn test_constructor_selection() -> Result<()> {
        let ty = overloaded();

        let by_text = AttributeDescriptor::new(&ty, vec!["a".into()])?;
        assert_eq!(by_text.constructor(), 0);

        let by_count = AttributeDescriptor::new(&ty, vec![Literal::I32(3)])?;
        assert_eq!(by_count.constructor(), 1);
        assert_eq!(by_count.args(), &[Literal::I32(3), Literal::Bool(false)]);

        let both = AttributeDescriptor::new(&ty, vec!["a".into(), Literal::I32(1)])?;
        assert_eq!(both.constructor(), 2);
        Ok(())
    }

    #[test]
    fn test_constructor_missing() {
        let ty = overloaded();
        assert!(matches!(
            AttributeDescriptor::new(&ty, vec![Literal::Bool(true)]),
            Err(Error::MissingMember { .. })
        ));
    }

    #[test]
    fn test_constructor_ambiguous() {
        let ty = AttributeType::new(
            "Twice",
            vec![
                vec![AttributeParam::required("a", TypeSig::String)],
                vec![AttributeParam::required("b", TypeSig::Object)],
            ],
        );
        assert!(matches!(
            AttributeDescriptor::new(&ty, vec!["x".into()]),
            Err(Error::AmbiguousDescriptor { candidates: 2, .. })
        ));
    }

    #[test]
    fn test_column_info_default_value() -> Result<()> {
        let tag = AttributeDescriptor::new(&AttributeType::column_info(), vec!["AllowDBNull".into()])?;
        assert_eq!(tag.args(), &[Literal::from("AllowDBNull"), Literal::Null]);
        Ok(())
    }

    #[test]
    fn test_decimal_literal_unsupported() {
        let literal = Literal::Decimal(serde_json::Number::from(1));
        assert!(matches!(
            literal.to_value(),
            Err(Error::UnsupportedLiteral(_))
        ));
        assert_eq!(Literal::I32(4).to_value().ok(), Some(Value::I32(4)));
    }
}
