//! Resolution of a fetched page body into a plain record list.
//!
//! Some APIs answer with a bare array, others wrap it in an object keyed by
//! the source's `records_key`. The shape is settled once, right after the
//! fetch, so transformation always works on a list.

use api_scraper_source_models::RawResponse;

use crate::transform::TransformError;
use crate::validate::json_type_name;

/// Resolves a page body against the configured records key.
///
/// A `null` under the records key is how several APIs say "no results", so
/// it resolves to an empty envelope rather than an error.
///
/// # Errors
///
/// Returns [`TransformError::MissingRecordsKey`] if an envelope lacks the
/// key, or [`TransformError::UnexpectedShape`] for any other shape.
pub fn resolve_response(
    body: serde_json::Value,
    records_key: &str,
) -> Result<RawResponse, TransformError> {
    match body {
        serde_json::Value::Array(records) => Ok(RawResponse::List(records)),
        serde_json::Value::Object(mut envelope) if !records_key.is_empty() => {
            match envelope.remove(records_key) {
                Some(serde_json::Value::Array(records)) => Ok(RawResponse::Envelope {
                    key: records_key.to_owned(),
                    records,
                }),
                Some(serde_json::Value::Null) => Ok(RawResponse::Envelope {
                    key: records_key.to_owned(),
                    records: Vec::new(),
                }),
                Some(other) => Err(TransformError::UnexpectedShape {
                    found: format!("'{records_key}' holds {}", json_type_name(&other)),
                }),
                None => Err(TransformError::MissingRecordsKey {
                    key: records_key.to_owned(),
                }),
            }
        }
        other => Err(TransformError::UnexpectedShape {
            found: json_type_name(&other).to_owned(),
        }),
    }
}
