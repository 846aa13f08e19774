//! JSON documents <-> DynamoDB items, via `serde_dynamo`.
//!
//! Numbers travel as `N` strings. String and number sets come back as JSON
//! arrays. An item that has no JSON form is reported as an internal backend
//! error rather than being read back partially.

use crate::domain::model::Document;
use crate::domain::ports::BackendResult;
use crate::utils::error::{BackendError, BackendErrorKind};
use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::Value;
use std::collections::HashMap;

pub type Item = HashMap<String, AttributeValue>;

pub fn to_item(document: &Document) -> BackendResult<Item> {
    serde_dynamo::aws_sdk_dynamodb_1::to_item(document).map_err(|e| {
        BackendError::validation(format!("Document cannot be stored as an item: {}", e))
    })
}

/// Expects a JSON object; used for `Key`, `ExclusiveStartKey` and
/// `ExpressionAttributeValues`.
pub fn to_item_value(field: &str, value: &Value) -> BackendResult<Item> {
    match value {
        Value::Object(map) => to_item(map),
        _ => Err(BackendError::validation(format!("{} must be a map", field))),
    }
}

pub fn from_item(item: &Item) -> BackendResult<Document> {
    serde_dynamo::from_item(item.clone()).map_err(|e| {
        BackendError::new(
            BackendErrorKind::Internal,
            "DeserializationError",
            format!("Item cannot be returned as JSON: {}", e),
        )
    })
}
