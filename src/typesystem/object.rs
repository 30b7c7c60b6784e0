//! The dynamic object protocol and the foreign-resource collaborator.

use std::{
    fmt,
    sync::{Arc, RwLock},
};

use crate::{
    runtime::Instance,
    typesystem::{Capability, Value},
    Error, Result,
};

/// Reference-counted dynamic object.
pub type ObjectRc = Arc<dyn DynObject>;

/// The protocol every object speaks.
///
/// Synthesized instances implement it by dispatching through their compiled type. Callers
/// implement it for their own structs to hand foreign objects to the proxy layer, or to let
/// detour members forward to concrete Rust code.
///
/// # Examples
///
/// ```rust
/// use std::sync::RwLock;
/// use typeforge::{typesystem::{DynObject, Value}, Error, Result};
///
/// #[derive(Debug)]
/// struct Counter {
///     count: RwLock<i32>,
/// }
///
/// impl DynObject for Counter {
///     fn type_name(&self) -> &str {
///         "Counter"
///     }
///
///     fn get(&self, name: &str, _index: &[Value]) -> Result<Value> {
///         match name {
///             "Count" => Ok(Value::I32(*self.count.read()?)),
///             _ => Err(Error::MissingMember { owner: "Counter".into(), member: name.into() }),
///         }
///     }
///
///     fn set(&self, name: &str, _index: &[Value], value: Value) -> Result<()> {
///         match (name, value) {
///             ("Count", Value::I32(v)) => Ok(*self.count.write()? = v),
///             (name, _) => Err(Error::MissingMember { owner: "Counter".into(), member: name.into() }),
///         }
///     }
///
///     fn invoke(&self, name: &str, _args: &[Value]) -> Result<Value> {
///         Err(Error::MissingMember { owner: "Counter".into(), member: name.into() })
///     }
/// }
///
/// let counter = Counter { count: RwLock::new(1) };
/// counter.set("Count", &[], Value::I32(5))?;
/// assert_eq!(counter.get("Count", &[])?, Value::I32(5));
/// # Ok::<(), typeforge::Error>(())
/// ```
pub trait DynObject: Send + Sync + fmt::Debug {
    /// Name of the object's type.
    fn type_name(&self) -> &str;

    /// Reads a property. `index` is empty unless the property is an indexer.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] for unknown properties, or whatever the accessor raises.
    fn get(&self, name: &str, index: &[Value]) -> Result<Value>;

    /// Writes a property. `index` is empty unless the property is an indexer.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] for unknown properties, or whatever the accessor raises.
    fn set(&self, name: &str, index: &[Value], value: Value) -> Result<()>;

    /// Invokes a method.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] for unknown methods, or whatever the method raises.
    fn invoke(&self, name: &str, args: &[Value]) -> Result<Value>;

    /// Returns `true` if the object implements the named capability.
    fn implements(&self, _capability: &str) -> bool {
        false
    }

    /// Returns the synthesized instance behind this object, if it is one.
    fn as_instance(&self) -> Option<&Instance> {
        None
    }
}

/// A named bag of values speaking [`DynObject`].
///
/// Every property can be read and written, unknown names are added on first write. A bag can
/// claim capabilities, which makes it usable as a foreign object behind a proxy.
#[derive(Debug)]
pub struct PropertyBag {
    type_name: String,
    capabilities: Vec<String>,
    values: RwLock<Vec<(String, Value)>>,
}

impl PropertyBag {
    /// Creates an empty bag.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            capabilities: Vec::new(),
            values: RwLock::new(Vec::new()),
        }
    }

    /// Adds a value while building the bag.
    #[must_use]
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Ok(mut values) = self.values.write() {
            values.push((name, value));
        }
        self
    }

    /// Declares that the bag implements a capability.
    #[must_use]
    pub fn implementing(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Finishes the bag as a shared object.
    #[must_use]
    pub fn into_object(self) -> ObjectRc {
        Arc::new(self)
    }
}

impl DynObject for PropertyBag {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get(&self, name: &str, _index: &[Value]) -> Result<Value> {
        let values = self.values.read()?;
        values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| Error::missing(&self.type_name, name))
    }

    fn set(&self, name: &str, _index: &[Value], value: Value) -> Result<()> {
        let mut values = self.values.write()?;
        match values.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => values.push((name.to_string(), value)),
        }
        Ok(())
    }

    fn invoke(&self, name: &str, _args: &[Value]) -> Result<Value> {
        Err(Error::missing(&self.type_name, name))
    }

    fn implements(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Releases the external resource owned by a wrapped foreign object.
///
/// The proxy layer calls this exactly once per live proxy, when the proxy is disposed or
/// finalized. Whether releasing twice is safe is up to the implementation.
pub trait ForeignRelease: Send + Sync {
    /// Releases the resource behind `target`.
    ///
    /// # Errors
    /// Implementation-specific; the error propagates out of `Dispose`.
    fn release(&self, target: &Value) -> Result<()>;
}

/// Default release: calls `Dispose()` on targets implementing the disposable capability.
///
/// Targets that are not disposable are left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvokeRelease;

impl ForeignRelease for InvokeRelease {
    fn release(&self, target: &Value) -> Result<()> {
        match target {
            Value::Object(object) if object.implements(Capability::DISPOSABLE) => {
                object.invoke(Capability::DISPOSE, &[]).map(|_| ())
            }
            _ => Ok(()),
        }
    }
}
