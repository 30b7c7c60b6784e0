//! Forwarding bodies for detour members.
//!
//! A detour body loads the wrapped target from its field, forwards the call with the arguments
//! unchanged and returns the result, optionally passed through a [`WrapFn`]. A null target is a
//! [`Error::NullReference`]; errors raised by the target propagate unchanged.

use std::sync::Arc;

use crate::{
    codegen::{GetterBody, MethodBody, SetterBody, WrapFn},
    runtime::{FieldHandle, Instance},
    typesystem::{ObjectRc, Value},
    Error, Result,
};

fn load_target(instance: &Instance, target: &FieldHandle, member: &str) -> Result<ObjectRc> {
    match target.get(instance)? {
        Value::Object(object) => Ok(object),
        Value::Null => Err(Error::NullReference(format!("{}.{member}", target.name()))),
        other => Err(Error::TypeMismatch {
            expected: target.ty().to_string(),
            found: other.describe(),
        }),
    }
}

/// Getter forwarding to the property `member` of the target.
///
/// With a `cache` field the getter memoizes: a populated cache is returned without touching
/// the target, otherwise the raw value is wrapped and stored into the cache once. A raw `Null`
/// is returned as is and leaves the cache empty. Without a cache, `wrap` runs on every read.
#[must_use]
pub fn forward_get(
    target: FieldHandle,
    member: String,
    wrap: Option<WrapFn>,
    cache: Option<FieldHandle>,
) -> GetterBody {
    Arc::new(move |instance, index| {
        if let Some(cache) = &cache {
            let cached = cache.get(instance)?;
            if !cached.is_null() {
                return Ok(cached);
            }
        }

        let raw = load_target(instance, &target, &member)?.get(&member, index)?;
        let Some(wrap) = &wrap else {
            return Ok(raw);
        };
        if raw.is_null() {
            return Ok(Value::Null);
        }

        let wrapped = wrap(raw)?;
        match &cache {
            Some(cache) => cache.set_if_null(instance, wrapped),
            None => Ok(wrapped),
        }
    })
}

/// Setter forwarding to the property `member` of the target.
#[must_use]
pub fn forward_set(target: FieldHandle, member: String) -> SetterBody {
    Arc::new(move |instance, index, value| {
        load_target(instance, &target, &member)?.set(&member, index, value)
    })
}

/// Method body forwarding to the method `member` of the target, wrapping every result.
#[must_use]
pub fn forward_invoke(target: FieldHandle, member: String, wrap: Option<WrapFn>) -> MethodBody {
    Arc::new(move |instance, args| {
        let raw = load_target(instance, &target, &member)?.invoke(&member, args)?;
        match &wrap {
            Some(wrap) if !raw.is_null() => wrap(raw),
            _ => Ok(raw),
        }
    })
}
