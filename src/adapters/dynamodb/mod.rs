pub mod attribute;

use crate::domain::model::{DeleteItem, Document, GetItem, PutItem, ScanItems, UpdateItem};
use crate::domain::ports::{BackendResult, DocumentStore};
use crate::utils::error::{BackendError, BackendErrorKind};
use async_trait::async_trait;
use attribute::{from_item, to_item, to_item_value, Item};
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::ReturnValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use serde_json::{json, Value};
use std::collections::HashMap;

/// DynamoDB-backed document store.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: DynamoClient,
}

impl DynamoStore {
    pub fn new(client: DynamoClient) -> Self {
        Self { client }
    }
}

/// Classifies SDK failures by error code.
fn backend_error<E, R>(err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    let (kind, code) = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            (BackendErrorKind::Unavailable, "ServiceUnavailable".to_string())
        }
        _ => {
            let code = err.code().unwrap_or("Unknown").to_string();
            let kind = match code.as_str() {
                "ResourceNotFoundException" => BackendErrorKind::ResourceNotFound,
                "ValidationException"
                | "ConditionalCheckFailedException"
                | "ItemCollectionSizeLimitExceededException"
                | "TransactionConflictException" => BackendErrorKind::Rejected,
                "ProvisionedThroughputExceededException"
                | "ThrottlingException"
                | "RequestLimitExceeded" => BackendErrorKind::Throttled,
                "ServiceUnavailable" | "InternalServerError" => BackendErrorKind::Unavailable,
                _ => BackendErrorKind::Internal,
            };
            (kind, code)
        }
    };

    tracing::debug!("DynamoDB error {}: {}", code, message);
    BackendError::new(kind, code, message)
}

fn string_field(options: &Document, field: &str) -> BackendResult<Option<String>> {
    match options.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(BackendError::validation(format!("{} must be a string", field))),
    }
}

fn bool_field(options: &Document, field: &str) -> BackendResult<Option<bool>> {
    match options.get(field) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(BackendError::validation(format!("{} must be a boolean", field))),
    }
}

fn names_field(options: &Document) -> BackendResult<Option<HashMap<String, String>>> {
    match options.get("ExpressionAttributeNames") {
        None => Ok(None),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(placeholder, name)| match name {
                Value::String(name) => Ok((placeholder.clone(), name.clone())),
                _ => Err(BackendError::validation(
                    "ExpressionAttributeNames values must be strings",
                )),
            })
            .collect::<BackendResult<HashMap<_, _>>>()
            .map(Some),
        Some(_) => Err(BackendError::validation(
            "ExpressionAttributeNames must be a map",
        )),
    }
}

fn item_field(options: &Document, field: &str) -> BackendResult<Option<Item>> {
    options
        .get(field)
        .map(|value| to_item_value(field, value))
        .transpose()
}

fn return_value_field(options: &Document) -> BackendResult<Option<ReturnValue>> {
    Ok(string_field(options, "ReturnValues")?.map(|v| ReturnValue::from(v.as_str())))
}

fn attributes_result(attributes: Option<&Item>) -> BackendResult<Value> {
    Ok(match attributes {
        Some(attributes) if !attributes.is_empty() => json!({ "Attributes": from_item(attributes)? }),
        _ => json!({}),
    })
}

#[async_trait]
impl DocumentStore for DynamoStore {
    async fn table_exists(&self, table: &str) -> BackendResult<bool> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if e.err().is_resource_not_found_exception() => Ok(false),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn put(&self, table: &str, request: PutItem) -> BackendResult<Value> {
        let PutItem { item, options } = request;
        let output = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(to_item(&item)?))
            .set_condition_expression(string_field(&options, "ConditionExpression")?)
            .set_expression_attribute_names(names_field(&options)?)
            .set_expression_attribute_values(item_field(&options, "ExpressionAttributeValues")?)
            .set_return_values(return_value_field(&options)?)
            .send()
            .await
            .map_err(backend_error)?;
        attributes_result(output.attributes())
    }

    async fn get(&self, table: &str, request: GetItem) -> BackendResult<Value> {
        let GetItem { key, options } = request;
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_item(&key)?))
            .set_consistent_read(bool_field(&options, "ConsistentRead")?)
            .set_projection_expression(string_field(&options, "ProjectionExpression")?)
            .set_expression_attribute_names(names_field(&options)?)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(match output.item() {
            Some(item) => json!({ "Item": from_item(item)? }),
            None => json!({}),
        })
    }

    async fn update(&self, table: &str, request: UpdateItem) -> BackendResult<Value> {
        let UpdateItem { key, changes } = request;
        let output = self
            .client
            .update_item()
            .table_name(table)
            .set_key(Some(to_item(&key)?))
            .set_update_expression(string_field(&changes, "UpdateExpression")?)
            .set_condition_expression(string_field(&changes, "ConditionExpression")?)
            .set_expression_attribute_names(names_field(&changes)?)
            .set_expression_attribute_values(item_field(&changes, "ExpressionAttributeValues")?)
            .set_return_values(return_value_field(&changes)?)
            .send()
            .await
            .map_err(backend_error)?;
        attributes_result(output.attributes())
    }

    async fn delete(&self, table: &str, request: DeleteItem) -> BackendResult<Value> {
        let DeleteItem { key, options } = request;
        let output = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(to_item(&key)?))
            .set_condition_expression(string_field(&options, "ConditionExpression")?)
            .set_expression_attribute_names(names_field(&options)?)
            .set_expression_attribute_values(item_field(&options, "ExpressionAttributeValues")?)
            .set_return_values(return_value_field(&options)?)
            .send()
            .await
            .map_err(backend_error)?;
        attributes_result(output.attributes())
    }

    async fn scan(&self, table: &str, request: ScanItems) -> BackendResult<Value> {
        let options = request.filter;
        let limit = match options.get("Limit") {
            None => None,
            Some(value) => Some(
                value
                    .as_i64()
                    .and_then(|limit| i32::try_from(limit).ok())
                    .ok_or_else(|| BackendError::validation("Limit must be an integer"))?,
            ),
        };

        let output = self
            .client
            .scan()
            .table_name(table)
            .set_index_name(string_field(&options, "IndexName")?)
            .set_filter_expression(string_field(&options, "FilterExpression")?)
            .set_projection_expression(string_field(&options, "ProjectionExpression")?)
            .set_expression_attribute_names(names_field(&options)?)
            .set_expression_attribute_values(item_field(&options, "ExpressionAttributeValues")?)
            .set_exclusive_start_key(item_field(&options, "ExclusiveStartKey")?)
            .set_consistent_read(bool_field(&options, "ConsistentRead")?)
            .set_limit(limit)
            .send()
            .await
            .map_err(backend_error)?;

        let items = output
            .items()
            .iter()
            .map(|item| from_item(item).map(Value::Object))
            .collect::<BackendResult<Vec<Value>>>()?;
        let mut result = json!({
            "Items": items,
            "Count": output.count(),
            "ScannedCount": output.scanned_count(),
        });
        if let Some(key) = output.last_evaluated_key() {
            result["LastEvaluatedKey"] = Value::Object(from_item(key)?);
        }
        Ok(result)
    }
}
