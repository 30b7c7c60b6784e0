use dashmap::DashMap;

use crate::config::SynthesisConfig;

/// Disambiguates type name templates.
///
/// Every template keeps its own counter, so two descriptors built from the same template on one
/// code host end up with different names. Names carry the member count as well, which makes
/// generated types easy to tell apart in a debugger.
#[derive(Debug, Default)]
pub struct NameGenerator {
    counters: DashMap<String, usize>,
}

impl NameGenerator {
    /// Creates a generator with no counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the final name of a type.
    ///
    /// Natural names and configurations without uniqueness are returned verbatim. Otherwise the
    /// result is ``<template>_<counter>`<member_count>``.
    #[must_use]
    pub fn resolve(
        &self,
        template: &str,
        natural: bool,
        member_count: usize,
        config: &SynthesisConfig,
    ) -> String {
        if natural || !config.ensure_unique_names {
            return template.to_string();
        }

        let counter = {
            let mut entry = self.counters.entry(template.to_string()).or_insert(0);
            let current = *entry;
            *entry += 1;
            current
        };
        format!("{template}_{counter}`{member_count}")
    }

    /// How often `template` has been disambiguated.
    #[must_use]
    pub fn count(&self, template: &str) -> usize {
        self.counters.get(template).map_or(0, |entry| *entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_names_are_unique() {
        let names = NameGenerator::new();
        let config = SynthesisConfig::default();

        let first = names.resolve("<>DynamicType", false, 3, &config);
        let second = names.resolve("<>DynamicType", false, 3, &config);
        let other = names.resolve("Row", false, 1, &config);

        assert_eq!(first, "<>DynamicType_0`3");
        assert_eq!(second, "<>DynamicType_1`3");
        assert_eq!(other, "Row_0`1");
        assert_eq!(names.count("<>DynamicType"), 2);
    }

    #[test]
    fn test_natural_and_stable_names_verbatim() {
        let names = NameGenerator::new();
        assert_eq!(
            names.resolve("dbo.Orders", true, 4, &SynthesisConfig::default()),
            "dbo.Orders"
        );
        assert_eq!(
            names.resolve("Row", false, 4, &SynthesisConfig::stable_names()),
            "Row"
        );
        assert_eq!(names.count("Row"), 0);
    }
}
