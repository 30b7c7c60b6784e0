use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, OnceLock,
};

use crossbeam_skiplist::SkipMap;
use tracing::debug;

use crate::{
    host::{CodeHost, DefaultTypeBuilder, TypeBuilder},
    runtime::CompiledTypeRc,
    token::Token,
    Error, Result,
};

/// Module state shared by a [`DefaultHost`] and its builders.
pub(crate) struct HostState {
    /// Sealed types indexed by token
    types: SkipMap<Token, CompiledTypeRc>,
    /// Sealed types in sealing order
    order: boxcar::Vec<CompiledTypeRc>,
    next_type: AtomicU32,
    next_field: AtomicU32,
    next_method: AtomicU32,
    next_property: AtomicU32,
    initialized: OnceLock<()>,
}

impl HostState {
    fn next_row(counter: &AtomicU32) -> u32 {
        counter.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_token(&self, table: u8) -> Token {
        let counter = match table {
            Token::TYPE => &self.next_type,
            Token::FIELD => &self.next_field,
            Token::PROPERTY => &self.next_property,
            _ => &self.next_method,
        };
        Token::from_parts(table, Self::next_row(counter))
    }

    pub(crate) fn register(&self, ty: CompiledTypeRc) {
        self.types.insert(ty.token(), ty.clone());
        self.order.push(ty);
    }
}

/// The in-process interpreting code host.
///
/// Cloning is cheap; clones share one module.
///
/// # Examples
///
/// ```rust
/// use typeforge::host::{CodeHost, DefaultHost};
///
/// let host = DefaultHost::new();
/// host.initialize()?;
/// let builder = host.define_type("Empty", None)?;
/// let ty = builder.seal()?;
///
/// assert_eq!(host.len(), 1);
/// assert!(host.type_by_token(ty.token()).is_some());
/// # Ok::<(), typeforge::Error>(())
/// ```
#[derive(Clone)]
pub struct DefaultHost {
    state: Arc<HostState>,
}

impl DefaultHost {
    /// Creates a host with an empty module.
    #[must_use]
    pub fn new() -> Self {
        DefaultHost {
            state: Arc::new(HostState {
                types: SkipMap::new(),
                order: boxcar::Vec::new(),
                next_type: AtomicU32::new(1),
                next_field: AtomicU32::new(1),
                next_method: AtomicU32::new(1),
                next_property: AtomicU32::new(1),
                initialized: OnceLock::new(),
            }),
        }
    }

    /// Returns `true` once [`CodeHost::initialize`] has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.initialized.get().is_some()
    }

    /// Looks up a sealed type by token.
    #[must_use]
    pub fn type_by_token(&self, token: Token) -> Option<CompiledTypeRc> {
        self.state.types.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up the first sealed type named `name`.
    #[must_use]
    pub fn type_by_name(&self, name: &str) -> Option<CompiledTypeRc> {
        self.state
            .order
            .iter()
            .find(|(_, ty)| ty.name() == name)
            .map(|(_, ty)| ty.clone())
    }

    /// All sealed types, in sealing order.
    #[must_use]
    pub fn types(&self) -> Vec<CompiledTypeRc> {
        self.state.order.iter().map(|(_, ty)| ty.clone()).collect()
    }

    /// Number of sealed types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.types.len()
    }

    /// Returns `true` if no type has been sealed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.types.is_empty()
    }
}

impl Default for DefaultHost {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeHost for DefaultHost {
    fn initialize(&self) -> Result<()> {
        self.state.initialized.get_or_init(|| {
            debug!("default code host initialized");
        });
        Ok(())
    }

    fn define_type(&self, name: &str, base: Option<CompiledTypeRc>) -> Result<Box<dyn TypeBuilder>> {
        if !self.is_initialized() {
            return Err(Error::Error(format!(
                "code host not initialized while defining '{name}'"
            )));
        }
        let token = self.state.next_token(Token::TYPE);
        Ok(Box::new(DefaultTypeBuilder::new(
            self.state.clone(),
            token,
            name.to_string(),
            base,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_requires_initialize() {
        let host = DefaultHost::new();
        assert!(host.define_type("Early", None).is_err());
        host.initialize().unwrap();
        host.initialize().unwrap();
        assert!(host.define_type("Late", None).is_ok());
    }

    #[test]
    fn test_unsealed_builder_leaves_nothing() {
        let host = DefaultHost::new();
        host.initialize().unwrap();
        let builder = host.define_type("Abandoned", None).unwrap();
        drop(builder);
        assert!(host.is_empty());
        assert!(host.type_by_name("Abandoned").is_none());
    }

    #[test]
    fn test_tokens_are_distinct() {
        let host = DefaultHost::new();
        host.initialize().unwrap();
        let first = host.define_type("A", None).unwrap().seal().unwrap();
        let second = host.define_type("A", None).unwrap().seal().unwrap();
        assert_ne!(first.token(), second.token());
        assert_eq!(first.token().table(), Token::TYPE);
        assert_eq!(host.types().len(), 2);
    }
}
