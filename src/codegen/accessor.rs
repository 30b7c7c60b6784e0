//! Field-backed and base-delegating accessor bodies.

use std::sync::Arc;

use crate::{
    codegen::{GetterBody, MethodBody, SetterBody},
    runtime::{FieldHandle, PropertyHandle},
    typesystem::Value,
};

/// Getter loading the backing field.
#[must_use]
pub fn field_getter(field: FieldHandle) -> GetterBody {
    Arc::new(move |instance, _| field.get(instance))
}

/// Setter storing into the backing field.
#[must_use]
pub fn field_setter(field: FieldHandle) -> SetterBody {
    Arc::new(move |instance, _, value| field.set(instance, value))
}

/// Getter calling the base type's getter of an overridden property.
#[must_use]
pub fn base_getter(base: Arc<PropertyHandle>) -> GetterBody {
    Arc::new(move |instance, index| base.get(instance, index))
}

/// Setter calling the base type's setter of an overridden property.
#[must_use]
pub fn base_setter(base: Arc<PropertyHandle>) -> SetterBody {
    Arc::new(move |instance, index, value| base.set(instance, index, value))
}

/// Method body doing nothing and returning `Null`.
#[must_use]
pub fn empty_body() -> MethodBody {
    Arc::new(|_, _| Ok(Value::Null))
}

/// Constructor body storing each argument into the matching field, in order.
#[must_use]
pub fn store_arguments(fields: Vec<FieldHandle>) -> MethodBody {
    Arc::new(move |instance, args| {
        for (field, value) in fields.iter().zip(args) {
            field.set(instance, value.clone())?;
        }
        Ok(Value::Null)
    })
}
