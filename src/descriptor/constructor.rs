use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{
    codegen::{method_gen, MethodBody, MethodGen, StaticBody},
    descriptor::{Dependency, ParameterDescriptor},
    runtime::ConstructorHandle,
    token::Token,
    Error, Result,
};

/// An instance constructor or a static initializer.
///
/// A constructor without body strategy does nothing beyond running the base type's
/// parameterless constructor. A static initializer runs exactly once, before first use of the
/// type.
pub struct ConstructorMember {
    params: Vec<ParameterDescriptor>,
    is_static: bool,
    pub(crate) body: Option<MethodGen>,
    pub(crate) static_body: Option<StaticBody>,
    pub(crate) depends_on: Vec<Dependency>,
    pub(crate) defined: bool,
    pub(crate) token: Option<Token>,
    pub(crate) bound: OnceLock<Arc<ConstructorHandle>>,
}

impl ConstructorMember {
    /// Instance constructor name.
    pub const INSTANCE: &'static str = ".ctor";
    /// Static initializer name.
    pub const STATIC: &'static str = ".cctor";

    /// A constructor with the given parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] for a static constructor with parameters.
    pub fn new(params: Vec<ParameterDescriptor>, is_static: bool) -> Result<Self> {
        if is_static && !params.is_empty() {
            return Err(Error::InvalidDescriptor(
                "a static constructor cannot take parameters".to_string(),
            ));
        }
        Ok(ConstructorMember {
            params,
            is_static,
            body: None,
            static_body: None,
            depends_on: Vec::new(),
            defined: false,
            token: None,
            bound: OnceLock::new(),
        })
    }

    /// The parameterless instance constructor.
    #[must_use]
    pub fn default_constructor() -> Self {
        ConstructorMember {
            params: Vec::new(),
            is_static: false,
            body: None,
            static_body: None,
            depends_on: Vec::new(),
            defined: false,
            token: None,
            bound: OnceLock::new(),
        }
    }

    /// An instance constructor with the given parameters.
    #[must_use]
    pub fn with_parameters(params: Vec<ParameterDescriptor>) -> Self {
        let mut constructor = Self::default_constructor();
        constructor.params = params;
        constructor
    }

    /// A static initializer running `body`.
    #[must_use]
    pub fn static_initializer(body: StaticBody) -> Self {
        let mut constructor = Self::default_constructor();
        constructor.is_static = true;
        constructor.static_body = Some(body);
        constructor
    }

    /// Supplies the body strategy of an instance constructor.
    #[must_use]
    pub fn with_body(mut self, body: MethodGen) -> Self {
        self.body = Some(body);
        self
    }

    /// Supplies a ready-made instance constructor body.
    #[must_use]
    pub fn with_body_fn(self, body: MethodBody) -> Self {
        self.with_body(method_gen(body))
    }

    /// Requires `dependency` to be defined before the body is generated.
    #[must_use]
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.depends_on.push(dependency);
        self
    }

    /// `.ctor` or `.cctor`.
    #[must_use]
    pub fn name(&self) -> &str {
        if self.is_static {
            Self::STATIC
        } else {
            Self::INSTANCE
        }
    }

    /// Parameters.
    #[must_use]
    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    /// Returns `true` for static initializers.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// The compiled handle of an instance constructor, once bound.
    #[must_use]
    pub fn handle(&self) -> Option<&Arc<ConstructorHandle>> {
        self.bound.get()
    }
}

impl fmt::Debug for ConstructorMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorMember")
            .field("name", &self.name())
            .field("params", &self.params)
            .field("has_body", &(self.body.is_some() || self.static_body.is_some()))
            .field("defined", &self.defined)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::TypeSig;

    #[test]
    fn test_static_with_parameters_rejected() {
        let result = ConstructorMember::new(vec![ParameterDescriptor::new(TypeSig::I4)], true);
        assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
    }

    #[test]
    fn test_names() {
        assert_eq!(ConstructorMember::default_constructor().name(), ".ctor");
        let cctor = ConstructorMember::new(Vec::new(), true).unwrap();
        assert_eq!(cctor.name(), ".cctor");
        assert!(cctor.is_static());
    }
}
