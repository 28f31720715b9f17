#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Source configuration types, scraping rules, and the normalized record
//! format.
//!
//! Every third-party API (fruit catalog, cocktail catalog, ...) is described
//! by a [`SourceConfig`] fetched from the remote config store, and every
//! page it returns is shaped into [`NormalizedRecord`]s before storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A single item as returned by a source API, before any shaping.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Field stamped onto every normalized record with the page's timestamp.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Field holding the folded ingredient/measure pairs.
pub const INGREDIENTS_FIELD: &str = "ingredients";

/// Letters iterated by the alphabetical scraping rule, in order.
pub const ALPHABET: [char; 26] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Storage table settings for a source (`dynamo_db_config` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Table name records are written to.
    pub table: String,
    /// Primary key attribute used for both deletes and puts.
    pub hash_key: String,
}

/// Source-specific shaping options.
///
/// Only `ingredient_max_count` is recognized; any other option is kept so
/// it round-trips but has no effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldInfo {
    /// When set, `ingredient_{i}`/`measure_{i}` pairs for `1..=N` are folded
    /// into a single `ingredients` list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_max_count: Option<u32>,
    /// Unrecognized options.
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Per-source configuration blob, fetched once per run.
///
/// Field names follow the config store's JSON layout; the Rust names
/// describe what each field is for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Name of the source this blob describes (authenticity check).
    #[serde(rename = "source_api")]
    pub source_name: String,
    /// Base endpoint of the source API.
    #[serde(rename = "source_api_endpoint")]
    pub endpoint: String,
    /// Name of the envelope field holding the record list. Empty when the
    /// API returns a bare list.
    #[serde(rename = "source_api_records_key")]
    pub records_key: String,
    /// Headers sent with every page request.
    #[serde(rename = "auth_header")]
    pub auth_headers: BTreeMap<String, String>,
    /// Old key → new key. Doubles as the allow-list of retained fields.
    pub field_mapping: BTreeMap<String, String>,
    /// Source-specific shaping options.
    pub custom_field_info: CustomFieldInfo,
    /// Storage table settings.
    #[serde(rename = "dynamo_db_config")]
    pub table_config: TableConfig,
}

/// How a source is paged through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RuleType {
    /// A single request against the configured endpoint.
    Default,
    /// One request per letter `a..=z`, each appended to the rule's query.
    Alphabetical,
}

/// Scraping rule resolved for a source's group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapingRule {
    /// Query suffix appended to the endpoint (e.g. `"?f="`).
    #[serde(default)]
    pub query: String,
    /// Paging strategy.
    #[serde(rename = "type")]
    pub kind: RuleType,
}

impl ScrapingRule {
    /// Derives the page requests this rule issues against `base_endpoint`.
    ///
    /// The default rule yields the base endpoint once. The alphabetical rule
    /// yields one target per letter, in alphabet order.
    #[must_use]
    pub fn page_targets(&self, base_endpoint: &str) -> Vec<PageTarget> {
        match self.kind {
            RuleType::Default => vec![PageTarget {
                letter: None,
                endpoint: base_endpoint.to_owned(),
            }],
            RuleType::Alphabetical => ALPHABET
                .iter()
                .map(|&letter| PageTarget {
                    letter: Some(letter),
                    endpoint: format!("{base_endpoint}{}{letter}", self.query),
                })
                .collect(),
        }
    }
}

/// One page request derived from a source's base endpoint and rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    /// Letter this page was derived for, if paging alphabetically.
    pub letter: Option<char>,
    /// Fully computed endpoint.
    pub endpoint: String,
}

impl std::fmt::Display for PageTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.letter {
            Some(letter) => write!(f, "letter '{letter}'"),
            None => f.write_str("single page"),
        }
    }
}

/// A fetched page body after its shape has been resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    /// The API returned a bare JSON array.
    List(Vec<serde_json::Value>),
    /// The API wrapped the array in an object under `key`.
    Envelope {
        /// Envelope field the records were found under.
        key: String,
        /// The unwrapped records.
        records: Vec<serde_json::Value>,
    },
}

impl RawResponse {
    /// Number of records in the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether the page holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Borrows the record list regardless of the original shape.
    #[must_use]
    pub fn records(&self) -> &[serde_json::Value] {
        match self {
            Self::List(records) | Self::Envelope { records, .. } => records,
        }
    }

    /// Consumes the response, returning the plain record list.
    #[must_use]
    pub fn into_records(self) -> Vec<serde_json::Value> {
        match self {
            Self::List(records) | Self::Envelope { records, .. } => records,
        }
    }
}

/// A record after pruning, renaming, timestamping and (optionally)
/// ingredient folding.
///
/// Serializes as the plain JSON object it wraps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord(RawRecord);

impl NormalizedRecord {
    /// Wraps an already-shaped field map.
    #[must_use]
    pub const fn from_map(fields: RawRecord) -> Self {
        Self(fields)
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Field names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Borrows the underlying field map.
    #[must_use]
    pub const fn as_map(&self) -> &RawRecord {
        &self.0
    }
}

impl From<NormalizedRecord> for serde_json::Value {
    fn from(record: NormalizedRecord) -> Self {
        Self::Object(record.0)
    }
}
