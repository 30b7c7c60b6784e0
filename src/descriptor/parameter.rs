use crate::typesystem::{TypeSig, Value};

/// Default of a parameter.
///
/// `None` is the sentinel for "no default, the argument must be supplied". It is distinct from
/// `Value(Value::Null)`, which is a legitimate default of absence-of-value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DefaultValue {
    /// The argument is required
    #[default]
    None,
    /// The argument may be omitted and takes this value
    Value(Value),
}

/// A method or constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    ty: TypeSig,
    name: Option<String>,
    default: DefaultValue,
}

impl ParameterDescriptor {
    /// A required, unnamed parameter.
    #[must_use]
    pub fn new(ty: TypeSig) -> Self {
        ParameterDescriptor {
            ty,
            name: None,
            default: DefaultValue::None,
        }
    }

    /// A required, named parameter.
    pub fn named(name: impl Into<String>, ty: TypeSig) -> Self {
        ParameterDescriptor {
            ty,
            name: Some(name.into()),
            default: DefaultValue::None,
        }
    }

    /// Makes the parameter optional with the given default.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultValue::Value(value.into());
        self
    }

    /// Parameter type.
    #[must_use]
    pub fn ty(&self) -> &TypeSig {
        &self.ty
    }

    /// Parameter name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The raw default slot.
    #[must_use]
    pub fn default(&self) -> &DefaultValue {
        &self.default
    }

    /// The default value, or `None` if the argument is required.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        match &self.default {
            DefaultValue::None => None,
            DefaultValue::Value(value) => Some(value),
        }
    }

    /// Returns `true` if the argument may be omitted.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        !matches!(self.default, DefaultValue::None)
    }
}
