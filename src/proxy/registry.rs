use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::{runtime::CompiledTypeRc, Result};

/// Wrapper types by capability name.
///
/// Wrapping the same capability twice reuses one compiled type; only the wrapped target differs
/// between proxies. [`WrapperRegistry::get_or_create`] holds the entry for its key while the
/// type is being built, so concurrent callers asking for the same capability wait for the first
/// one instead of compiling a second type.
#[derive(Debug, Default)]
pub struct WrapperRegistry {
    types: DashMap<String, CompiledTypeRc>,
}

impl WrapperRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapper type registered for `capability`, if any.
    #[must_use]
    pub fn get(&self, capability: &str) -> Option<CompiledTypeRc> {
        self.types.get(capability).map(|entry| entry.value().clone())
    }

    /// Returns the registered wrapper type of `capability`, building it with `create` if there
    /// is none yet.
    ///
    /// `create` must not access this registry.
    ///
    /// # Errors
    /// Returns whatever `create` raises; nothing is registered in that case.
    pub fn get_or_create<F>(&self, capability: &str, create: F) -> Result<CompiledTypeRc>
    where
        F: FnOnce() -> Result<CompiledTypeRc>,
    {
        match self.types.entry(capability.to_string()) {
            Entry::Occupied(entry) => {
                debug!(capability, ty = %entry.get().name(), "wrapper type reused");
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                let ty = create()?;
                debug!(capability, ty = %ty.name(), "wrapper type registered");
                Ok(entry.insert(ty).value().clone())
            }
        }
    }

    /// Returns `true` if a wrapper type exists for `capability`.
    #[must_use]
    pub fn contains(&self, capability: &str) -> bool {
        self.types.contains_key(capability)
    }

    /// Number of registered wrapper types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{descriptor::TypeDescriptor, synthesis::Synthesizer, Error};

    #[test]
    fn test_created_once() -> Result<()> {
        let synthesizer = Synthesizer::with_default_host();
        let registry = WrapperRegistry::new();
        let mut builds = 0;

        let first = registry.get_or_create("IFoo", || {
            builds += 1;
            synthesizer.compile(&mut TypeDescriptor::new("Foo"))
        })?;
        let second = registry.get_or_create("IFoo", || {
            builds += 1;
            synthesizer.compile(&mut TypeDescriptor::new("Foo"))
        })?;

        assert_eq!(builds, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.contains("IFoo"));
        assert_eq!(registry.len(), 1);
        Ok(())
    }

    #[test]
    fn test_failed_create_not_registered() {
        let registry = WrapperRegistry::new();
        let result = registry.get_or_create("IBar", || Err(Error::Error("boom".into())));
        assert!(result.is_err());
        assert!(registry.is_empty());
        assert!(registry.get("IBar").is_none());
    }
}
