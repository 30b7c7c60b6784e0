//! Resolved member handles of a compiled type.
//!
//! Handles are created by the code host while a type is being defined and become read-only
//! once the type is sealed. Descriptors bind to them after sealing, so accessing a member
//! through its descriptor never resolves anything by name again.

use std::{
    fmt,
    sync::{Arc, RwLock},
};

use crate::{
    codegen::{GetterBody, MethodBody, SetterBody},
    descriptor::{AttributeInstance, FieldAttributes, MethodAttributes, ParameterDescriptor},
    runtime::Instance,
    token::Token,
    typesystem::{CapabilityRc, TypeSig, Value},
    Error, Result,
};

/// Storage shared by all static fields of one type.
pub type StaticSlots = Arc<RwLock<Vec<Value>>>;

/// Where the value of a field lives.
#[derive(Clone)]
pub enum FieldStorage {
    /// Slot index into the instance storage (inherited slots first)
    Instance(usize),
    /// Slot index into the type-wide static storage
    Static(StaticSlots, usize),
}

/// A defined field.
#[derive(Clone)]
pub struct FieldHandle {
    pub(crate) token: Token,
    pub(crate) name: String,
    pub(crate) ty: TypeSig,
    pub(crate) flags: FieldAttributes,
    pub(crate) storage: FieldStorage,
    pub(crate) attributes: Arc<[AttributeInstance]>,
}

impl FieldHandle {
    /// Token assigned by the code host.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared storage type.
    #[must_use]
    pub fn ty(&self) -> &TypeSig {
        &self.ty
    }

    /// Field flags.
    #[must_use]
    pub fn flags(&self) -> FieldAttributes {
        self.flags
    }

    /// Metadata attached to the field.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeInstance] {
        &self.attributes
    }

    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self.storage, FieldStorage::Static(..))
    }

    /// Loads the field value of `instance` (ignored for static fields).
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the storage lock was poisoned.
    pub fn get(&self, instance: &Instance) -> Result<Value> {
        match &self.storage {
            FieldStorage::Instance(slot) => instance.load_slot(*slot, &self.name),
            FieldStorage::Static(..) => self.get_static(),
        }
    }

    /// Stores `value` into the field of `instance` after admitting it to the field type.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] if the value does not fit the field.
    pub fn set(&self, instance: &Instance, value: Value) -> Result<()> {
        let value = self.ty.admit(value)?;
        match &self.storage {
            FieldStorage::Instance(slot) => instance.store_slot(*slot, &self.name, value),
            FieldStorage::Static(slots, slot) => store(slots, *slot, &self.name, value),
        }
    }

    /// Stores `value` only if the field currently holds `Null`, returning the value the field
    /// holds afterwards.
    ///
    /// The check and the store happen under one lock, so the first writer wins.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] if the value does not fit the field.
    pub fn set_if_null(&self, instance: &Instance, value: Value) -> Result<Value> {
        let value = self.ty.admit(value)?;
        match &self.storage {
            FieldStorage::Instance(slot) => instance.store_slot_if_null(*slot, &self.name, value),
            FieldStorage::Static(slots, slot) => {
                let mut slots = slots.write()?;
                let current = slots
                    .get_mut(*slot)
                    .ok_or_else(|| Error::missing("<static>", &self.name))?;
                if current.is_null() {
                    *current = value;
                }
                Ok(current.clone())
            }
        }
    }

    /// Loads a static field.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] for instance fields.
    pub fn get_static(&self) -> Result<Value> {
        match &self.storage {
            FieldStorage::Static(slots, slot) => slots
                .read()?
                .get(*slot)
                .cloned()
                .ok_or_else(|| Error::missing("<static>", &self.name)),
            FieldStorage::Instance(_) => Err(Error::InvalidDescriptor(format!(
                "field '{}' is not static",
                self.name
            ))),
        }
    }

    /// Stores a static field.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] for instance fields, [`Error::TypeMismatch`] if the
    /// value does not fit.
    pub fn set_static(&self, value: Value) -> Result<()> {
        match &self.storage {
            FieldStorage::Static(slots, slot) => {
                store(slots, *slot, &self.name, self.ty.admit(value)?)
            }
            FieldStorage::Instance(_) => Err(Error::InvalidDescriptor(format!(
                "field '{}' is not static",
                self.name
            ))),
        }
    }
}

fn store(slots: &StaticSlots, slot: usize, name: &str, value: Value) -> Result<()> {
    let mut slots = slots.write()?;
    match slots.get_mut(slot) {
        Some(current) => {
            *current = value;
            Ok(())
        }
        None => Err(Error::missing("<static>", name)),
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHandle")
            .field("token", &self.token)
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("static", &self.is_static())
            .finish()
    }
}

/// A capability member satisfied by a type member.
#[derive(Clone, Debug)]
pub struct MemberRef {
    /// The capability declaring the member
    pub capability: CapabilityRc,
    /// The member name on the capability
    pub name: String,
}

/// A defined property with its accessor bodies.
pub struct PropertyHandle {
    pub(crate) token: Token,
    pub(crate) name: String,
    pub(crate) ty: TypeSig,
    pub(crate) index: Vec<TypeSig>,
    pub(crate) getter: Option<GetterBody>,
    pub(crate) setter: Option<SetterBody>,
    pub(crate) overrides: Vec<MemberRef>,
    pub(crate) attributes: Vec<AttributeInstance>,
}

impl PropertyHandle {
    /// Token assigned by the code host.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value type.
    #[must_use]
    pub fn ty(&self) -> &TypeSig {
        &self.ty
    }

    /// Index parameter types.
    #[must_use]
    pub fn index(&self) -> &[TypeSig] {
        &self.index
    }

    /// Capability members this property satisfies explicitly.
    #[must_use]
    pub fn overrides(&self) -> &[MemberRef] {
        &self.overrides
    }

    /// Metadata attached to the property.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeInstance] {
        &self.attributes
    }

    /// Returns `true` if the property has a getter.
    #[must_use]
    pub fn can_read(&self) -> bool {
        self.getter.is_some()
    }

    /// Returns `true` if the property has a setter.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.setter.is_some()
    }

    /// Runs the getter.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentCount`] on a wrong number of index values,
    /// [`Error::MissingMember`] if there is no getter, or whatever the body raises.
    pub fn get(&self, instance: &Instance, index: &[Value]) -> Result<Value> {
        self.check_index(index)?;
        match &self.getter {
            Some(getter) => getter(instance, index),
            None => Err(Error::missing(&self.name, "get")),
        }
    }

    /// Runs the setter after admitting `value` to the property type.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentCount`] on a wrong number of index values,
    /// [`Error::TypeMismatch`] if the value does not fit, [`Error::MissingMember`] if there is
    /// no setter, or whatever the body raises.
    pub fn set(&self, instance: &Instance, index: &[Value], value: Value) -> Result<()> {
        self.check_index(index)?;
        let value = self.ty.admit(value)?;
        match &self.setter {
            Some(setter) => setter(instance, index, value),
            None => Err(Error::missing(&self.name, "set")),
        }
    }

    fn check_index(&self, index: &[Value]) -> Result<()> {
        if index.len() != self.index.len() {
            return Err(Error::ArgumentCount {
                member: self.name.clone(),
                expected: self.index.len(),
                found: index.len(),
            });
        }
        for (ty, value) in self.index.iter().zip(index) {
            if !ty.accepts(value) {
                return Err(Error::TypeMismatch {
                    expected: ty.to_string(),
                    found: value.describe(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyHandle")
            .field("token", &self.token)
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("index", &self.index)
            .field("get", &self.can_read())
            .field("set", &self.can_write())
            .finish()
    }
}

/// Fills trailing arguments from parameter defaults and admits every argument.
fn bind_arguments(member: &str, params: &[ParameterDescriptor], args: &[Value]) -> Result<Vec<Value>> {
    if args.len() > params.len() {
        return Err(Error::ArgumentCount {
            member: member.to_string(),
            expected: params.len(),
            found: args.len(),
        });
    }

    let mut bound = Vec::with_capacity(params.len());
    for (i, param) in params.iter().enumerate() {
        let value = match args.get(i) {
            Some(value) => value.clone(),
            None => match param.default_value() {
                Some(default) => default.clone(),
                None => {
                    return Err(Error::ArgumentCount {
                        member: member.to_string(),
                        expected: params.len(),
                        found: args.len(),
                    })
                }
            },
        };
        bound.push(param.ty().admit(value)?);
    }
    Ok(bound)
}

fn accepts_arguments(params: &[ParameterDescriptor], args: &[Value]) -> bool {
    args.len() <= params.len()
        && params.iter().enumerate().all(|(i, param)| match args.get(i) {
            Some(value) => param.ty().accepts(value),
            None => param.default_value().is_some(),
        })
}

/// A defined method with its body.
pub struct MethodHandle {
    pub(crate) token: Token,
    pub(crate) name: String,
    pub(crate) return_type: TypeSig,
    pub(crate) params: Vec<ParameterDescriptor>,
    pub(crate) flags: MethodAttributes,
    pub(crate) body: MethodBody,
    pub(crate) overrides: Vec<MemberRef>,
    pub(crate) attributes: Vec<AttributeInstance>,
}

impl MethodHandle {
    /// Token assigned by the code host.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return type.
    #[must_use]
    pub fn return_type(&self) -> &TypeSig {
        &self.return_type
    }

    /// Parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    /// Method flags.
    #[must_use]
    pub fn flags(&self) -> MethodAttributes {
        self.flags
    }

    /// Capability members this method satisfies explicitly.
    #[must_use]
    pub fn overrides(&self) -> &[MemberRef] {
        &self.overrides
    }

    /// Metadata attached to the method.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeInstance] {
        &self.attributes
    }

    /// Returns `true` if `args` can be bound to the parameters.
    #[must_use]
    pub fn accepts(&self, args: &[Value]) -> bool {
        accepts_arguments(&self.params, args)
    }

    /// Invokes the method on `instance`.
    ///
    /// Missing trailing arguments are taken from parameter defaults.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentCount`] or [`Error::TypeMismatch`] if the arguments cannot be
    /// bound, or whatever the body raises.
    pub fn invoke(&self, instance: &Instance, args: &[Value]) -> Result<Value> {
        let args = bind_arguments(&self.name, &self.params, args)?;
        (self.body)(instance, &args)
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("token", &self.token)
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("params", &self.params.len())
            .finish()
    }
}

/// A defined instance constructor.
pub struct ConstructorHandle {
    pub(crate) token: Token,
    pub(crate) params: Vec<ParameterDescriptor>,
    pub(crate) body: Option<MethodBody>,
}

impl ConstructorHandle {
    /// Token assigned by the code host.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    /// Returns `true` if `args` can be bound to the parameters.
    #[must_use]
    pub fn accepts(&self, args: &[Value]) -> bool {
        accepts_arguments(&self.params, args)
    }

    /// Runs the constructor body on a freshly allocated instance.
    ///
    /// # Errors
    /// Returns argument binding errors or whatever the body raises.
    pub fn run(&self, instance: &Instance, args: &[Value]) -> Result<()> {
        let args = bind_arguments(".ctor", &self.params, args)?;
        match &self.body {
            Some(body) => body(instance, &args).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ConstructorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorHandle")
            .field("token", &self.token)
            .field("params", &self.params.len())
            .finish()
    }
}
