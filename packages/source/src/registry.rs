//! Source registry: resolves a source API name to its group and scraping
//! rule.
//!
//! The built-in mapping lives in `packages/source/api_mapping.toml` and is
//! baked into the binary at compile time via [`include_str!`]. Registering a
//! new source is a matter of adding an `[[api_group_mappings]]` entry and,
//! for a new group, an `[api_group_scraping_rules.<group>]` table.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use api_scraper_source_models::ScrapingRule;
use serde::Deserialize;

/// Mapping embedded at compile time.
const API_MAPPING_TOML: &str = include_str!("../api_mapping.toml");

static BUILTIN: LazyLock<ApiMapping> = LazyLock::new(|| {
    ApiMapping::from_toml_str(API_MAPPING_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse api_mapping.toml: {e}"))
});

/// Errors from source or group lookups.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No mapping entry names this source.
    #[error("api_name not found for source_api_name - {source_name}")]
    UnknownSource {
        /// The requested source name.
        source_name: String,
    },

    /// The source's group has no scraping rule.
    #[error("no scraping rule registered for api group '{group}'")]
    UnknownGroup {
        /// The group that was looked up.
        group: String,
    },
}

/// One `api_name → api_group` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiGroupMapping {
    /// Source API name as passed on invocation.
    pub api_name: String,
    /// Group sharing a scraping rule.
    pub api_group: String,
}

/// The full source → group → rule table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiMapping {
    /// Source-to-group entries, in declaration order.
    pub api_group_mappings: Vec<ApiGroupMapping>,
    /// Rule per group.
    pub api_group_scraping_rules: BTreeMap<String, ScrapingRule>,
}

/// A source together with its resolved group and rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSource<'a> {
    /// Group the source belongs to.
    pub group: &'a str,
    /// Rule governing how the source is paged.
    pub rule: &'a ScrapingRule,
}

impl ApiMapping {
    /// Returns the mapping embedded in the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (caught by the test suite,
    /// since the file is compiled in).
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Parses a mapping from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or missing required tables.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(toml_str)
    }

    /// Looks up the group a source belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownSource`] if the source is not
    /// registered.
    pub fn resolve_group(&self, source_name: &str) -> Result<&str, ResolveError> {
        self.api_group_mappings
            .iter()
            .find(|m| m.api_name == source_name)
            .map(|m| m.api_group.as_str())
            .ok_or_else(|| ResolveError::UnknownSource {
                source_name: source_name.to_owned(),
            })
    }

    /// Looks up the scraping rule for a group.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownGroup`] if the group has no rule entry.
    pub fn resolve_rule(&self, group: &str) -> Result<&ScrapingRule, ResolveError> {
        self.api_group_scraping_rules
            .get(group)
            .ok_or_else(|| ResolveError::UnknownGroup {
                group: group.to_owned(),
            })
    }

    /// Resolves both the group and the rule for a source.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if either lookup fails.
    pub fn resolve(&self, source_name: &str) -> Result<ResolvedSource<'_>, ResolveError> {
        let group = self.resolve_group(source_name)?;
        let rule = self.resolve_rule(group)?;
        log::debug!("{source_name}: group '{group}', rule {}", rule.kind);
        Ok(ResolvedSource { group, rule })
    }

    /// Registered source names, in declaration order.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.api_group_mappings.iter().map(|m| m.api_name.as_str())
    }
}
