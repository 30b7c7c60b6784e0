//! The disposal state machine.
//!
//! One instance moves `Live -> Disposed` exactly once. The transition runs synchronously
//! inside a single `Dispose` call:
//!
//! 1. pre-release hooks
//! 2. `Dispose` on every non-null child field (nested proxies that were never materialized
//!    are null and skipped)
//! 3. the release hook on the wrapped target, if the target is not null
//! 4. post-release hooks
//! 5. the disposed flag is set
//!
//! Once the flag is set, every further call returns immediately.

use std::sync::Arc;

use tracing::debug;

use crate::{
    codegen::{DisposeHook, MethodBody},
    runtime::{FieldHandle, MethodHandle},
    typesystem::{Capability, Value},
};

/// Handles and hooks the disposal body works with.
pub struct DisposePlan {
    /// Boolean flag field
    pub disposed: FieldHandle,
    /// Field holding the wrapped target
    pub target: FieldHandle,
    /// Fields cascaded to, in order
    pub children: Vec<FieldHandle>,
    /// Hooks run before anything is released
    pub pre_release: Vec<DisposeHook>,
    /// Releases the wrapped target
    pub release: Option<DisposeHook>,
    /// Hooks run after the target has been released
    pub post_release: Vec<DisposeHook>,
}

/// Builds the `Dispose` body.
#[must_use]
pub fn dispose_body(plan: DisposePlan) -> MethodBody {
    Arc::new(move |instance, _| {
        if plan.disposed.get(instance)?.as_bool() == Some(true) {
            return Ok(Value::Null);
        }

        let target = plan.target.get(instance)?;
        for hook in &plan.pre_release {
            hook(instance, &target)?;
        }

        for child in &plan.children {
            if let Value::Object(nested) = child.get(instance)? {
                nested.invoke(Capability::DISPOSE, &[])?;
            }
        }

        if !target.is_null() {
            if let Some(release) = &plan.release {
                release(instance, &target)?;
            }
        }

        for hook in &plan.post_release {
            hook(instance, &target)?;
        }

        plan.disposed.set(instance, Value::Bool(true))?;
        debug!(ty = %instance.compiled_type().name(), "disposed");
        Ok(Value::Null)
    })
}

/// Builds a finalizer body delegating to the disposal method.
#[must_use]
pub fn finalizer_body(dispose: Arc<MethodHandle>) -> MethodBody {
    Arc::new(move |instance, _| dispose.invoke(instance, &[]))
}
