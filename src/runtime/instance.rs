use std::{
    fmt,
    sync::{Arc, RwLock},
};

use tracing::warn;

use crate::{
    runtime::{CompiledTypeRc, Dispatch},
    typesystem::{Capability, DynObject, ObjectRc, Value},
    Error, Result,
};

/// Reference-counted instance.
pub type InstanceRc = Arc<Instance>;

/// An object of a synthesized type.
///
/// Each instance owns its slot storage; everything else (accessor bodies, dispatch) is shared
/// through the compiled type. Instances carry no synchronisation beyond the lock guarding the
/// slots, so concurrent writers to one instance race at the level of whole member operations.
///
/// When the last reference to an instance whose type declares a finalizer goes away, the
/// finalizer runs. Its errors are logged and swallowed.
pub struct Instance {
    ty: CompiledTypeRc,
    slots: RwLock<Vec<Value>>,
}

impl Instance {
    pub(crate) fn new(ty: CompiledTypeRc, slots: Vec<Value>) -> Self {
        Instance {
            ty,
            slots: RwLock::new(slots),
        }
    }

    /// The compiled type of this instance.
    #[must_use]
    pub fn compiled_type(&self) -> &CompiledTypeRc {
        &self.ty
    }

    /// Turns the instance into a dynamic object reference.
    #[must_use]
    pub fn to_object(self: &Arc<Self>) -> ObjectRc {
        self.clone()
    }

    /// Turns the instance into a [`Value::Object`].
    #[must_use]
    pub fn to_value(self: &Arc<Self>) -> Value {
        Value::Object(self.to_object())
    }

    pub(crate) fn load_slot(&self, slot: usize, name: &str) -> Result<Value> {
        self.slots
            .read()?
            .get(slot)
            .cloned()
            .ok_or_else(|| Error::missing(self.ty.name(), name))
    }

    pub(crate) fn store_slot(&self, slot: usize, name: &str, value: Value) -> Result<()> {
        let mut slots = self.slots.write()?;
        match slots.get_mut(slot) {
            Some(current) => {
                *current = value;
                Ok(())
            }
            None => Err(Error::missing(self.ty.name(), name)),
        }
    }

    pub(crate) fn store_slot_if_null(&self, slot: usize, name: &str, value: Value) -> Result<Value> {
        let mut slots = self.slots.write()?;
        match slots.get_mut(slot) {
            Some(current) => {
                if current.is_null() {
                    *current = value;
                }
                Ok(current.clone())
            }
            None => Err(Error::missing(self.ty.name(), name)),
        }
    }

    /// Reads a property, or a field when no property has that name.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if neither exists, or whatever the getter raises.
    pub fn get(&self, name: &str) -> Result<Value> {
        match self.ty.property(name) {
            Some(property) => property.get(self, &[]),
            None => self.field(name),
        }
    }

    /// Writes a property, or a field when no property has that name.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if neither exists, [`Error::TypeMismatch`] if the value
    /// does not fit, or whatever the setter raises.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.ty.property(name) {
            Some(property) => property.set(self, &[], value),
            None => self.set_field(name, value),
        }
    }

    /// Reads an indexer.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if there is no such property, or whatever the getter
    /// raises.
    pub fn get_index(&self, name: &str, index: &[Value]) -> Result<Value> {
        self.ty
            .property(name)
            .ok_or_else(|| Error::missing(self.ty.name(), name))?
            .get(self, index)
    }

    /// Writes an indexer.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if there is no such property, or whatever the setter
    /// raises.
    pub fn set_index(&self, name: &str, index: &[Value], value: impl Into<Value>) -> Result<()> {
        self.ty
            .property(name)
            .ok_or_else(|| Error::missing(self.ty.name(), name))?
            .set(self, index, value.into())
    }

    /// Invokes the first method named `name` whose parameters accept `args`.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if no method has that name, [`Error::ArgumentCount`]
    /// if none accepts the arguments, or whatever the body raises.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.ty.find_method(name, args) {
            Some(method) => method.invoke(self, args),
            None => match self.ty.method(name) {
                Some(method) => Err(Error::ArgumentCount {
                    member: name.to_string(),
                    expected: method.params.len(),
                    found: args.len(),
                }),
                None => Err(Error::missing(self.ty.name(), name)),
            },
        }
    }

    /// Reads a property through the implementation of `capability`.
    ///
    /// Falls back to the property named `name` when the type has no explicit dispatch entry.
    ///
    /// # Errors
    /// As [`Instance::get`].
    pub fn get_via(&self, capability: &str, name: &str) -> Result<Value> {
        match self.ty.dispatch(capability, name) {
            Some(Dispatch::Property(property)) => property.get(self, &[]),
            _ => self.get(name),
        }
    }

    /// Writes a property through the implementation of `capability`.
    ///
    /// # Errors
    /// As [`Instance::set`].
    pub fn set_via(&self, capability: &str, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.ty.dispatch(capability, name) {
            Some(Dispatch::Property(property)) => property.set(self, &[], value),
            _ => self.set(name, value),
        }
    }

    /// Invokes a method through the implementation of `capability`.
    ///
    /// Overloads are tried in declaration order; the first whose parameters accept `args` runs.
    ///
    /// # Errors
    /// As [`Instance::invoke`].
    pub fn invoke_via(&self, capability: &str, name: &str, args: &[Value]) -> Result<Value> {
        match self
            .ty
            .dispatch(capability, name)
            .and_then(|dispatch| dispatch.method_for(args))
        {
            Some(method) => method.invoke(self, args),
            None => self.invoke(name, args),
        }
    }

    /// Reads a field directly, bypassing properties.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the type has no such field.
    pub fn field(&self, name: &str) -> Result<Value> {
        self.ty
            .field(name)
            .ok_or_else(|| Error::missing(self.ty.name(), name))?
            .get(self)
    }

    /// Writes a field directly, bypassing properties.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the type has no such field, [`Error::TypeMismatch`]
    /// if the value does not fit.
    pub fn set_field(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.ty
            .field(name)
            .ok_or_else(|| Error::missing(self.ty.name(), name))?
            .set(self, value.into())
    }

    /// Disposes the instance through the disposable capability.
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the type is not disposable, or whatever disposal
    /// raises.
    pub fn dispose(&self) -> Result<()> {
        self.invoke_via(Capability::DISPOSABLE, Capability::DISPOSE, &[])
            .map(|_| ())
    }
}

impl DynObject for Instance {
    fn type_name(&self) -> &str {
        self.ty.name()
    }

    fn get(&self, name: &str, index: &[Value]) -> Result<Value> {
        if index.is_empty() {
            Instance::get(self, name)
        } else {
            self.get_index(name, index)
        }
    }

    fn set(&self, name: &str, index: &[Value], value: Value) -> Result<()> {
        if index.is_empty() {
            Instance::set(self, name, value)
        } else {
            self.set_index(name, index, value)
        }
    }

    fn invoke(&self, name: &str, args: &[Value]) -> Result<Value> {
        Instance::invoke(self, name, args)
    }

    fn implements(&self, capability: &str) -> bool {
        self.ty.implements(capability)
    }

    fn as_instance(&self) -> Option<&Instance> {
        Some(self)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some(finalizer) = self.ty.finalizer() {
            if let Err(error) = finalizer(self, &[]) {
                warn!(ty = %self.ty.name(), %error, "finalizer failed");
            }
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.ty.name())
            .field("slots", &self.slots)
            .finish()
    }
}
