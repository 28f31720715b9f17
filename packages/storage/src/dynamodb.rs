//! `DynamoDB` implementation of [`BatchWriteBackend`].

use std::collections::HashMap;

use aws_sdk_dynamodb::{
    Client,
    types::{
        AttributeValue, DeleteRequest, PutRequest, ReturnConsumedCapacity,
        WriteRequest as SdkWriteRequest,
    },
};
use serde_json::Value;

use api_scraper_source_models::RawRecord;

use crate::{BackendError, BatchWriteBackend, WriteRequest};

/// Converts a JSON value into a `DynamoDB` attribute value.
///
/// Numbers keep their JSON text so no precision is lost.
#[must_use]
pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute_value).collect()),
        Value::Object(fields) => AttributeValue::M(to_item(fields)),
    }
}

/// Converts a JSON object into a `DynamoDB` item.
#[must_use]
pub fn to_item(fields: &RawRecord) -> HashMap<String, AttributeValue> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

/// Converts a [`WriteRequest`] into the SDK's request type.
///
/// # Errors
///
/// Returns an error if the SDK builder rejects the request.
pub fn to_sdk_request(request: &WriteRequest) -> Result<SdkWriteRequest, BackendError> {
    Ok(match request {
        WriteRequest::Delete { key } => SdkWriteRequest::builder()
            .delete_request(DeleteRequest::builder().set_key(Some(to_item(key))).build()?)
            .build(),
        WriteRequest::Put { item } => SdkWriteRequest::builder()
            .put_request(PutRequest::builder().set_item(Some(to_item(item))).build()?)
            .build(),
    })
}

/// Writes batches with `BatchWriteItem`.
#[derive(Debug, Clone)]
pub struct DynamoDbBackend {
    client: Client,
}

impl DynamoDbBackend {
    /// Creates a backend from the standard AWS environment (region,
    /// credentials, endpoint overrides).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }

    /// Creates a backend from an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

impl BatchWriteBackend for DynamoDbBackend {
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<(), BackendError> {
        let count = requests.len();
        let requests = requests
            .iter()
            .map(to_sdk_request)
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|e| Box::new(e.into_service_error()) as BackendError)?;

        let capacity: f64 = output
            .consumed_capacity()
            .iter()
            .filter_map(aws_sdk_dynamodb::types::ConsumedCapacity::capacity_units)
            .sum();
        log::debug!("[{table}] Wrote {count} requests ({capacity} capacity units)");

        let unprocessed: usize = output
            .unprocessed_items()
            .map_or(0, |items| items.values().map(Vec::len).sum());
        if unprocessed > 0 {
            return Err(format!("{unprocessed} of {count} requests left unprocessed").into());
        }

        Ok(())
    }
}
