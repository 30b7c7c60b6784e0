//! Synthesis configuration
//!
//! This module provides the options that steer name generation, implicit storage naming,
//! proxy naming and nullability inference. Every knob has a default matching the behavior
//! callers expect without configuration.

/// How tabular schema inference decides whether a value-typed column may hold null.
///
/// Readers are not required to supply nullability metadata. The two policies differ only in
/// what they assume when the metadata is absent; explicit metadata is always honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullabilityPolicy {
    /// Absent metadata means the column is nullable
    #[default]
    NullableUnlessNotNull,
    /// Absent metadata means the column never holds null
    TrustMetadata,
}

impl NullabilityPolicy {
    /// Resolves the nullability of a column from its (optional) metadata.
    #[must_use]
    pub fn allows_null(self, metadata: Option<bool>) -> bool {
        match (self, metadata) {
            (_, Some(flag)) => flag,
            (NullabilityPolicy::NullableUnlessNotNull, None) => true,
            (NullabilityPolicy::TrustMetadata, None) => false,
        }
    }
}

/// Configuration for the synthesis engine and everything built on top of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisConfig {
    /// Append a per-template counter and the member count to template type names
    pub ensure_unique_names: bool,

    /// Name template used when a descriptor has no natural name
    pub default_type_name: String,

    /// Prefix of implicit backing fields shared between capabilities (`m_<Name>`)
    pub backing_field_prefix: String,

    /// Name of the private flag field added by disposal members
    pub disposed_field_name: String,

    /// Prefix of proxy wrapper type names (`Managed_<Capability>`)
    pub wrapper_prefix: String,

    /// Nullability assumption for tabular columns without metadata
    pub nullability: NullabilityPolicy,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            ensure_unique_names: true,
            default_type_name: "<>DynamicType".to_string(),
            backing_field_prefix: "m_".to_string(),
            disposed_field_name: "_disposed".to_string(),
            wrapper_prefix: "Managed_".to_string(),
            nullability: NullabilityPolicy::NullableUnlessNotNull,
        }
    }
}

impl SynthesisConfig {
    /// Creates a configuration that keeps template names verbatim
    ///
    /// Useful when a single synthesizer builds each template at most once and the type names
    /// are shown to users.
    #[must_use]
    pub fn stable_names() -> Self {
        Self {
            ensure_unique_names: false,
            ..Self::default()
        }
    }

    /// Returns this configuration with a different nullability policy
    #[must_use]
    pub fn with_nullability(mut self, nullability: NullabilityPolicy) -> Self {
        self.nullability = nullability;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SynthesisConfig::default();
        assert!(config.ensure_unique_names);
        assert_eq!(config.default_type_name, "<>DynamicType");
        assert_eq!(config.backing_field_prefix, "m_");
        assert_eq!(config.nullability, NullabilityPolicy::NullableUnlessNotNull);
    }

    #[test]
    fn test_stable_names() {
        let config = SynthesisConfig::stable_names();
        assert!(!config.ensure_unique_names);
        assert_eq!(config.wrapper_prefix, "Managed_");
    }

    #[test]
    fn test_nullability_policy() {
        assert!(NullabilityPolicy::NullableUnlessNotNull.allows_null(None));
        assert!(!NullabilityPolicy::TrustMetadata.allows_null(None));
        assert!(!NullabilityPolicy::NullableUnlessNotNull.allows_null(Some(false)));
        assert!(NullabilityPolicy::TrustMetadata.allows_null(Some(true)));
    }
}
