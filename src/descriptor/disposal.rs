//! Disposal and finalization members.
//!
//! A [`DisposalMember`] synthesizes an idempotent `Dispose` implementing
//! `Typeforge.IDisposable`: it cascades to child fields, releases the wrapped target and flips a
//! generated boolean flag. A [`FinalizerMember`] synthesizes the finalizer, which calls the
//! disposal method when an instance is dropped without having been disposed explicitly.

use std::{fmt, sync::Arc};

use crate::{
    codegen::DisposeHook,
    config::SynthesisConfig,
    descriptor::{Dependency, FieldMember, MethodMember, OverrideTarget},
    runtime::Instance,
    token::Token,
    typesystem::{Capability, ForeignRelease, TypeSig},
    Result,
};

/// The disposal method.
pub struct DisposalMember {
    target_field: String,
    children: Vec<String>,
    pub(crate) pre_release: Vec<DisposeHook>,
    pub(crate) release: Option<DisposeHook>,
    pub(crate) post_release: Vec<DisposeHook>,
    disposed_field: Option<String>,
    pub(crate) method: MethodMember,
}

impl DisposalMember {
    /// Disposal of the object wrapped in `target_field`.
    pub fn new(target_field: impl Into<String>) -> Self {
        DisposalMember {
            target_field: target_field.into(),
            children: Vec::new(),
            pre_release: Vec::new(),
            release: None,
            post_release: Vec::new(),
            disposed_field: None,
            method: MethodMember::new(Capability::DISPOSE, TypeSig::Void)
                .overriding(OverrideTarget::Capability(Capability::disposable())),
        }
    }

    /// Cascades to the object in `field`.
    #[must_use]
    pub fn with_child(mut self, field: impl Into<String>) -> Self {
        self.children.push(field.into());
        self
    }

    /// Cascades to the objects in `fields`, in order.
    #[must_use]
    pub fn with_children<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Adds a hook run before anything is released.
    #[must_use]
    pub fn with_pre_release(mut self, hook: DisposeHook) -> Self {
        self.pre_release.push(hook);
        self
    }

    /// Sets the hook releasing the wrapped target.
    #[must_use]
    pub fn with_release(mut self, hook: DisposeHook) -> Self {
        self.release = Some(hook);
        self
    }

    /// Releases the wrapped target through `release`.
    #[must_use]
    pub fn with_release_via(self, release: Arc<dyn ForeignRelease>) -> Self {
        self.with_release(Arc::new(move |_, target| release.release(target)))
    }

    /// Adds a hook run after the target has been released.
    #[must_use]
    pub fn with_post_release(mut self, hook: DisposeHook) -> Self {
        self.post_release.push(hook);
        self
    }

    /// Overrides the name of the generated disposed flag.
    #[must_use]
    pub fn with_disposed_field(mut self, name: impl Into<String>) -> Self {
        self.disposed_field = Some(name.into());
        self
    }

    /// Field holding the wrapped target.
    #[must_use]
    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// Child fields, in cascade order.
    #[must_use]
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// The disposed flag name, once resolved.
    #[must_use]
    pub fn disposed_field(&self) -> Option<&str> {
        self.disposed_field.as_deref()
    }

    /// The `Dispose` method being synthesized.
    #[must_use]
    pub fn method(&self) -> &MethodMember {
        &self.method
    }

    pub(crate) fn prepare(&mut self, config: &SynthesisConfig) -> FieldMember {
        let name = self
            .disposed_field
            .get_or_insert_with(|| config.disposed_field_name.clone())
            .clone();
        FieldMember::generated(name, TypeSig::Boolean)
    }

    pub(crate) fn dependencies(&self) -> Vec<Dependency> {
        std::iter::once(&self.target_field)
            .chain(&self.children)
            .chain(self.disposed_field.as_ref())
            .map(|name| Dependency::Field(name.clone()))
            .collect()
    }

    /// Disposes `instance` through the bound method.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] before the owning type is compiled, or the
    /// first error raised by a hook or child.
    pub fn dispose(&self, instance: &Instance) -> Result<()> {
        self.method.invoke(instance, &[]).map(|_| ())
    }
}

impl fmt::Debug for DisposalMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalMember")
            .field("target_field", &self.target_field)
            .field("children", &self.children)
            .field("pre_release", &self.pre_release.len())
            .field("release", &self.release.is_some())
            .field("post_release", &self.post_release.len())
            .field("disposed_field", &self.disposed_field)
            .field("method", &self.method)
            .finish()
    }
}

/// The finalizer.
#[derive(Debug)]
pub struct FinalizerMember {
    pub(crate) disposal_method: String,
    pub(crate) defined: bool,
    pub(crate) token: Option<Token>,
}

impl FinalizerMember {
    /// Finalizer name.
    pub const NAME: &'static str = "Finalize";

    /// A finalizer calling `Dispose`.
    #[must_use]
    pub fn new() -> Self {
        FinalizerMember {
            disposal_method: Capability::DISPOSE.to_string(),
            defined: false,
            token: None,
        }
    }

    /// A finalizer calling the named method instead.
    #[must_use]
    pub fn delegating_to(method: impl Into<String>) -> Self {
        FinalizerMember {
            disposal_method: method.into(),
            ..Self::new()
        }
    }

    /// `Finalize`.
    #[must_use]
    pub fn name(&self) -> &str {
        Self::NAME
    }

    /// The method the finalizer calls.
    #[must_use]
    pub fn disposal_method(&self) -> &str {
        &self.disposal_method
    }
}

impl Default for FinalizerMember {
    fn default() -> Self {
        Self::new()
    }
}
