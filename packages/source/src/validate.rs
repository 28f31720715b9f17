//! Validation of per-source configuration blobs.
//!
//! Blobs come from a remote store that can be edited at any time, so they
//! are checked strictly before any network call is made. Validation runs on
//! the raw [`serde_json::Value`] so that errors can name the offending field
//! and the type actually found; only a blob that passes is deserialized into
//! a [`SourceConfig`].

use std::collections::BTreeMap;

use api_scraper_source_models::SourceConfig;

/// Key set `dynamo_db_config` must have, sorted.
pub const TABLE_CONFIG_KEYS: [&str; 2] = ["hash_key", "table"];

/// Recognized `custom_field_info` option for ingredient folding.
pub const INGREDIENT_MAX_COUNT: &str = "ingredient_max_count";

/// JSON type a top-level config field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expected {
    String,
    Object,
}

impl Expected {
    const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Object => "object",
        }
    }

    fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Object => value.is_object(),
        }
    }
}

/// Every field a config blob must carry, with its type.
const SCHEMA: &[(&str, Expected)] = &[
    ("source_api", Expected::String),
    ("source_api_records_key", Expected::String),
    ("source_api_endpoint", Expected::String),
    ("auth_header", Expected::Object),
    ("field_mapping", Expected::Object),
    ("custom_field_info", Expected::Object),
    ("dynamo_db_config", Expected::Object),
];

/// Errors raised by config validation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The blob itself is not a JSON object.
    #[error("config blob must be an object, found {actual}")]
    NotAnObject {
        /// JSON type found.
        actual: &'static str,
    },

    /// The blob describes a different source than the one requested.
    #[error("config relates to '{found}', expected '{expected}'")]
    IdentityMismatch {
        /// Requested source name.
        expected: String,
        /// `source_api` value in the blob.
        found: String,
    },

    /// A required field is absent.
    #[error("config field '{field}' is missing")]
    MissingField {
        /// Field path.
        field: String,
    },

    /// A field has the wrong JSON type.
    #[error("config field '{field}' must be {expected}, found {actual}")]
    WrongType {
        /// Field path.
        field: String,
        /// Type the schema declares.
        expected: &'static str,
        /// Type actually present.
        actual: &'static str,
    },

    /// A field the schema does not declare is present.
    #[error("unexpected config field '{field}'")]
    UnknownField {
        /// Field path.
        field: String,
    },

    /// `dynamo_db_config` does not have exactly the expected keys.
    #[error("dynamo_db_config must have keys {TABLE_CONFIG_KEYS:?}, found {found:?}")]
    TableConfigKeys {
        /// Sorted keys found.
        found: Vec<String>,
    },

    /// Two mapping entries rename to the same target.
    #[error("field_mapping renames both '{first}' and '{second}' to '{target}'")]
    DuplicateTarget {
        /// Shared target name.
        target: String,
        /// First source key.
        first: String,
        /// Second source key.
        second: String,
    },

    /// A recognized `custom_field_info` option has an unusable value.
    #[error("custom_field_info.{field} is invalid: {message}")]
    InvalidCustomField {
        /// Option name.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// The blob passed structural checks but still failed to deserialize.
    #[error("config could not be deserialized: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// Name of a JSON value's type, for error messages.
#[must_use]
pub const fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Validates a config blob fetched for `source_name`.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found: identity, then schema, then
/// table config, then mapping and option consistency.
pub fn validate(source_name: &str, blob: &serde_json::Value) -> Result<(), ValidationError> {
    let Some(fields) = blob.as_object() else {
        return Err(ValidationError::NotAnObject {
            actual: json_type_name(blob),
        });
    };

    validate_identity(source_name, fields)?;
    validate_schema(fields)?;
    validate_table_config(&fields["dynamo_db_config"])?;
    validate_field_mapping(&fields["field_mapping"])?;
    validate_string_values("auth_header", &fields["auth_header"])?;
    validate_custom_field_info(&fields["custom_field_info"])?;

    Ok(())
}

/// Validates a blob and deserializes it into a [`SourceConfig`].
///
/// # Errors
///
/// Returns [`ValidationError`] if validation or deserialization fails.
pub fn validate_and_parse(
    source_name: &str,
    blob: serde_json::Value,
) -> Result<SourceConfig, ValidationError> {
    validate(source_name, &blob)?;
    let config: SourceConfig = serde_json::from_value(blob)?;
    log::debug!(
        "[{source_name}] Config valid ({} mapped fields, table '{}')",
        config.field_mapping.len(),
        config.table_config.table
    );
    Ok(config)
}

fn validate_identity(
    source_name: &str,
    fields: &serde_json::Map<String, serde_json::Value>,
) -> Result<(), ValidationError> {
    let value = fields
        .get("source_api")
        .ok_or_else(|| ValidationError::MissingField {
            field: "source_api".to_owned(),
        })?;
    let found = value.as_str().ok_or_else(|| ValidationError::WrongType {
        field: "source_api".to_owned(),
        expected: Expected::String.name(),
        actual: json_type_name(value),
    })?;

    if found != source_name {
        return Err(ValidationError::IdentityMismatch {
            expected: source_name.to_owned(),
            found: found.to_owned(),
        });
    }
    Ok(())
}

fn validate_schema(fields: &serde_json::Map<String, serde_json::Value>) -> Result<(), ValidationError> {
    for (key, value) in fields {
        let Some((_, expected)) = SCHEMA.iter().find(|(name, _)| name == key) else {
            return Err(ValidationError::UnknownField { field: key.clone() });
        };
        if !expected.matches(value) {
            return Err(ValidationError::WrongType {
                field: key.clone(),
                expected: expected.name(),
                actual: json_type_name(value),
            });
        }
    }

    if let Some((name, _)) = SCHEMA.iter().find(|(name, _)| !fields.contains_key(*name)) {
        return Err(ValidationError::MissingField {
            field: (*name).to_owned(),
        });
    }
    Ok(())
}

fn validate_table_config(value: &serde_json::Value) -> Result<(), ValidationError> {
    let table_config = value
        .as_object()
        .ok_or_else(|| ValidationError::WrongType {
            field: "dynamo_db_config".to_owned(),
            expected: Expected::Object.name(),
            actual: json_type_name(value),
        })?;

    let mut keys: Vec<String> = table_config.keys().cloned().collect();
    keys.sort();
    if keys != TABLE_CONFIG_KEYS {
        return Err(ValidationError::TableConfigKeys { found: keys });
    }

    validate_string_values("dynamo_db_config", value)
}

fn validate_field_mapping(value: &serde_json::Value) -> Result<(), ValidationError> {
    validate_string_values("field_mapping", value)?;

    let mut targets: BTreeMap<&str, &str> = BTreeMap::new();
    for (old_key, new_key) in value.as_object().into_iter().flatten() {
        let Some(new_key) = new_key.as_str() else {
            continue;
        };
        if let Some(first) = targets.insert(new_key, old_key.as_str()) {
            return Err(ValidationError::DuplicateTarget {
                target: new_key.to_owned(),
                first: first.to_owned(),
                second: old_key.clone(),
            });
        }
    }
    Ok(())
}

fn validate_custom_field_info(value: &serde_json::Value) -> Result<(), ValidationError> {
    let Some(max_count) = value.get(INGREDIENT_MAX_COUNT) else {
        return Ok(());
    };

    max_count
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .map(|_| ())
        .ok_or_else(|| ValidationError::InvalidCustomField {
            field: INGREDIENT_MAX_COUNT.to_owned(),
            message: format!("expected a non-negative integer, found {max_count}"),
        })
}

/// Checks that every value of the object at `field` is a string.
fn validate_string_values(field: &str, value: &serde_json::Value) -> Result<(), ValidationError> {
    for (key, inner) in value.as_object().into_iter().flatten() {
        if !inner.is_string() {
            return Err(ValidationError::WrongType {
                field: format!("{field}.{key}"),
                expected: Expected::String.name(),
                actual: json_type_name(inner),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fruity_vice_blob() -> serde_json::Value {
        serde_json::json!({
            "source_api": "fruity-vice",
            "auth_header": {},
            "custom_field_info": {},
            "source_api_endpoint": "https://www.fruityvice.com/api/fruit/all",
            "source_api_records_key": "",
            "field_mapping": {
                "id": "id1",
                "name": "name",
                "family": "family1",
                "genus": "genus1",
                "order": "order1"
            },
            "dynamo_db_config": {"table": "fruit", "hash_key": "name"}
        })
    }

    #[test]
    fn accepts_valid_blob() {
        validate("fruity-vice", &fruity_vice_blob()).unwrap();
        let config = validate_and_parse("fruity-vice", fruity_vice_blob()).unwrap();
        assert_eq!(config.table_config.table, "fruit");
        assert_eq!(config.field_mapping.len(), 5);
    }

    #[test]
    fn rejects_identity_mismatch() {
        let mut blob = fruity_vice_blob();
        blob["source_api"] = serde_json::json!("other");
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::IdentityMismatch { ref expected, ref found }
                if expected == "fruity-vice" && found == "other"
        ));
    }

    #[test]
    fn rejects_blob_for_other_requested_source() {
        let err = validate("dummy", &fruity_vice_blob()).unwrap_err();
        assert!(matches!(err, ValidationError::IdentityMismatch { .. }));
    }

    #[test]
    fn rejects_non_object_blob() {
        let err = validate("fruity-vice", &serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, ValidationError::NotAnObject { actual: "array" }));
    }

    #[test]
    fn rejects_wrong_field_type() {
        let mut blob = fruity_vice_blob();
        blob["auth_header"] = serde_json::json!("token");
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::WrongType { ref field, expected: "object", actual: "string" }
                if field == "auth_header"
        ));
    }

    #[test]
    fn rejects_unknown_field() {
        let mut blob = fruity_vice_blob();
        blob["surprise"] = serde_json::json!(1);
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField { ref field } if field == "surprise"));
    }

    #[test]
    fn rejects_missing_field() {
        let mut blob = fruity_vice_blob();
        blob.as_object_mut().unwrap().remove("field_mapping");
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field } if field == "field_mapping"));
    }

    #[test]
    fn missing_source_api_is_a_schema_error() {
        let mut blob = fruity_vice_blob();
        blob.as_object_mut().unwrap().remove("source_api");
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field } if field == "source_api"));
    }

    #[test]
    fn rejects_empty_table_config() {
        let mut blob = fruity_vice_blob();
        blob["dynamo_db_config"] = serde_json::json!({});
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(err, ValidationError::TableConfigKeys { ref found } if found.is_empty()));
    }

    #[test]
    fn rejects_extra_table_config_key() {
        let mut blob = fruity_vice_blob();
        blob["dynamo_db_config"]["region"] = serde_json::json!("eu-west-2");
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(err, ValidationError::TableConfigKeys { ref found } if found.len() == 3));
    }

    #[test]
    fn rejects_non_string_mapping_target() {
        let mut blob = fruity_vice_blob();
        blob["field_mapping"]["id"] = serde_json::json!(1);
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(err, ValidationError::WrongType { ref field, .. } if field == "field_mapping.id"));
    }

    #[test]
    fn rejects_duplicate_mapping_target() {
        let mut blob = fruity_vice_blob();
        blob["field_mapping"]["genus"] = serde_json::json!("family1");
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::DuplicateTarget { ref target, .. } if target == "family1"
        ));
    }

    #[test]
    fn rejects_negative_ingredient_max_count() {
        let mut blob = fruity_vice_blob();
        blob["custom_field_info"] = serde_json::json!({"ingredient_max_count": -1});
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCustomField { .. }));
    }

    #[test]
    fn accepts_ingredient_max_count() {
        let mut blob = fruity_vice_blob();
        blob["custom_field_info"] = serde_json::json!({"ingredient_max_count": 15});
        let config = validate_and_parse("fruity-vice", blob).unwrap();
        assert_eq!(config.custom_field_info.ingredient_max_count, Some(15));
    }

    #[test]
    fn rejects_non_string_header_value() {
        let mut blob = fruity_vice_blob();
        blob["auth_header"] = serde_json::json!({"X-Api-Key": 42});
        let err = validate("fruity-vice", &blob).unwrap_err();
        assert!(matches!(err, ValidationError::WrongType { ref field, .. } if field == "auth_header.X-Api-Key"));
    }
}
