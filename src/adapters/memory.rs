use crate::adapters::expression::{
    apply_update, matches_all, parse_condition, parse_projection, parse_update, Condition,
};
use crate::domain::model::{DeleteItem, Document, GetItem, PutItem, ScanItems, UpdateItem};
use crate::domain::ports::{BackendResult, DocumentStore};
use crate::utils::error::{BackendError, BackendErrorKind};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

/// One key attribute value. Numbers compare by value, so `1` and `1.0`
/// name the same item and numeric keys sort numerically.
#[derive(Debug, Clone)]
enum KeyPart {
    Number(f64),
    String(String),
}

impl KeyPart {
    fn from_value(attr: &str, value: &Value) -> BackendResult<Self> {
        match value {
            Value::String(s) => Ok(KeyPart::String(s.clone())),
            Value::Number(n) => n
                .as_f64()
                .filter(|n| n.is_finite())
                // -0.0 與 0.0 視為同一個鍵
                .map(|n| KeyPart::Number(if n == 0.0 { 0.0 } else { n }))
                .ok_or_else(|| {
                    BackendError::validation(format!(
                        "One or more parameter values were invalid: Invalid number for key {}",
                        attr
                    ))
                }),
            _ => Err(BackendError::validation(format!(
                "One or more parameter values were invalid: Type mismatch for key {}",
                attr
            ))),
        }
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Number(a), KeyPart::Number(b)) => a.total_cmp(b),
            (KeyPart::String(a), KeyPart::String(b)) => a.cmp(b),
            (KeyPart::Number(_), KeyPart::String(_)) => Ordering::Less,
            (KeyPart::String(_), KeyPart::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

/// Key attribute values in key-schema order.
type StorageKey = Vec<KeyPart>;

#[derive(Debug, Clone)]
struct MemoryTable {
    key_schema: Vec<String>,
    items: BTreeMap<StorageKey, Document>,
}

impl MemoryTable {
    /// 依 key schema 產生排序用的內部鍵；多出或缺少的鍵屬性都視為錯誤
    fn storage_key(&self, key: &Document) -> BackendResult<StorageKey> {
        if key.len() != self.key_schema.len() {
            return Err(BackendError::validation(
                "The provided key element does not match the schema",
            ));
        }
        self.encode_key(key)
    }

    fn item_key(&self, item: &Document) -> BackendResult<StorageKey> {
        for attr in &self.key_schema {
            if !item.contains_key(attr) {
                return Err(BackendError::validation(format!(
                    "One or more parameter values were invalid: Missing the key {} in the item",
                    attr
                )));
            }
        }
        self.encode_key(item)
    }

    fn encode_key(&self, source: &Document) -> BackendResult<StorageKey> {
        self.key_schema
            .iter()
            .map(|attr| match source.get(attr) {
                Some(value) => KeyPart::from_value(attr, value),
                None => Err(BackendError::validation(
                    "The provided key element does not match the schema",
                )),
            })
            .collect()
    }

    fn key_of(&self, item: &Document) -> Document {
        self.key_schema
            .iter()
            .filter_map(|attr| item.get(attr).map(|value| (attr.clone(), value.clone())))
            .collect()
    }
}

/// A process-local document store. Used by the local server and as the
/// backend double in tests; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, key_schema: &[&str]) -> Self {
        let key_schema: Vec<String> = key_schema.iter().map(|s| s.to_string()).collect();
        self.create_table(name, key_schema);
        self
    }

    /// Creates the table if it does not exist yet. An empty key schema falls
    /// back to a single `id` attribute.
    pub fn create_table(&self, name: &str, key_schema: Vec<String>) -> bool {
        let key_schema = if key_schema.is_empty() {
            vec!["id".to_string()]
        } else {
            key_schema
        };
        let mut tables = match self.tables.write() {
            Ok(tables) => tables,
            Err(poisoned) => poisoned.into_inner(),
        };
        if tables.contains_key(name) {
            return false;
        }
        tracing::debug!("Creating in-memory table '{}' keyed by {:?}", name, key_schema);
        tables.insert(
            name.to_string(),
            MemoryTable {
                key_schema,
                items: BTreeMap::new(),
            },
        );
        true
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.tables.read() {
            Ok(tables) => tables.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        names.sort();
        names
    }

    fn with_table_mut<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemoryTable) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut tables = self.tables.write().map_err(|_| lock_poisoned())?;
        let table = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        f(table)
    }

    fn with_table_ref<T>(
        &self,
        table: &str,
        f: impl FnOnce(&MemoryTable) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        let table = tables.get(table).ok_or_else(|| missing_table(table))?;
        f(table)
    }
}

fn lock_poisoned() -> BackendError {
    BackendError::new(
        BackendErrorKind::Internal,
        "InternalServerError",
        "in-memory table lock poisoned",
    )
}

fn missing_table(table: &str) -> BackendError {
    BackendError::resource_not_found(format!("Requested resource not found: Table: {} not found", table))
}

fn object_option<'a>(options: &'a Document, field: &str) -> BackendResult<Option<&'a Document>> {
    match options.get(field) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(BackendError::validation(format!("{} must be a map", field))),
    }
}

fn string_option<'a>(options: &'a Document, field: &str) -> BackendResult<Option<&'a str>> {
    match options.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(BackendError::validation(format!("{} must be a string", field))),
    }
}

fn condition_option(options: &Document, field: &str) -> BackendResult<Option<Vec<Condition>>> {
    match string_option(options, field)? {
        None => Ok(None),
        Some(expression) => Ok(Some(parse_condition(
            expression,
            object_option(options, "ExpressionAttributeNames")?,
            object_option(options, "ExpressionAttributeValues")?,
        )?)),
    }
}

fn check_condition(options: &Document, existing: Option<&Document>) -> BackendResult<()> {
    if let Some(conditions) = condition_option(options, "ConditionExpression")? {
        let empty = Document::new();
        if !matches_all(existing.unwrap_or(&empty), &conditions) {
            return Err(BackendError::new(
                BackendErrorKind::Rejected,
                "ConditionalCheckFailedException",
                "The conditional request failed",
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnValues {
    Nothing,
    AllOld,
    AllNew,
}

fn return_values(options: &Document, allowed: &[&str]) -> BackendResult<ReturnValues> {
    let value = string_option(options, "ReturnValues")?.unwrap_or("NONE");
    if !allowed.contains(&value) {
        return Err(BackendError::validation(format!(
            "ReturnValues {} is not supported for this operation",
            value
        )));
    }
    Ok(match value {
        "ALL_OLD" => ReturnValues::AllOld,
        "ALL_NEW" => ReturnValues::AllNew,
        _ => ReturnValues::Nothing,
    })
}

fn attributes_result(image: Option<Document>) -> Value {
    match image {
        Some(image) => json!({ "Attributes": image }),
        None => json!({}),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn table_exists(&self, table: &str) -> BackendResult<bool> {
        let tables = self.tables.read().map_err(|_| lock_poisoned())?;
        Ok(tables.contains_key(table))
    }

    async fn put(&self, table: &str, request: PutItem) -> BackendResult<Value> {
        let PutItem { item, options } = request;
        let returns = return_values(&options, &["NONE", "ALL_OLD"])?;

        self.with_table_mut(table, |table| {
            let key = table.item_key(&item)?;
            check_condition(&options, table.items.get(&key))?;
            let old = table.items.insert(key, item);
            Ok(attributes_result(match returns {
                ReturnValues::AllOld => old,
                _ => None,
            }))
        })
    }

    async fn get(&self, table: &str, request: GetItem) -> BackendResult<Value> {
        let GetItem { key, options } = request;
        let projection = match string_option(&options, "ProjectionExpression")? {
            Some(expression) => Some(parse_projection(
                expression,
                object_option(&options, "ExpressionAttributeNames")?,
            )?),
            None => None,
        };

        self.with_table_ref(table, |table| {
            let key = table.storage_key(&key)?;
            // 查無資料時回傳空物件，與文件型資料庫的慣例一致
            let Some(item) = table.items.get(&key) else {
                return Ok(json!({}));
            };
            let item = match &projection {
                Some(attrs) => item
                    .iter()
                    .filter(|(name, _)| attrs.contains(*name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
                None => item.clone(),
            };
            Ok(json!({ "Item": item }))
        })
    }

    async fn update(&self, table: &str, request: UpdateItem) -> BackendResult<Value> {
        let UpdateItem { key, changes } = request;
        let returns = return_values(&changes, &["NONE", "ALL_OLD", "ALL_NEW"])?;
        let actions = match string_option(&changes, "UpdateExpression")? {
            Some(expression) => parse_update(
                expression,
                object_option(&changes, "ExpressionAttributeNames")?,
                object_option(&changes, "ExpressionAttributeValues")?,
            )?,
            None => Vec::new(),
        };

        self.with_table_mut(table, |table| {
            let storage_key = table.storage_key(&key)?;
            let old = table.items.get(&storage_key).cloned();
            check_condition(&changes, old.as_ref())?;

            let mut updated = old.clone().unwrap_or_else(|| key.clone());
            apply_update(&mut updated, &actions)?;
            if table.item_key(&updated)? != storage_key {
                return Err(BackendError::validation(
                    "One or more parameter values were invalid: Cannot update attribute that is part of the key",
                ));
            }
            table.items.insert(storage_key, updated.clone());

            Ok(attributes_result(match returns {
                ReturnValues::AllOld => old,
                ReturnValues::AllNew => Some(updated),
                ReturnValues::Nothing => None,
            }))
        })
    }

    async fn delete(&self, table: &str, request: DeleteItem) -> BackendResult<Value> {
        let DeleteItem { key, options } = request;
        let returns = return_values(&options, &["NONE", "ALL_OLD"])?;

        self.with_table_mut(table, |table| {
            let key = table.storage_key(&key)?;
            check_condition(&options, table.items.get(&key))?;
            let old = table.items.remove(&key);
            Ok(attributes_result(match returns {
                ReturnValues::AllOld => old,
                _ => None,
            }))
        })
    }

    async fn scan(&self, table: &str, request: ScanItems) -> BackendResult<Value> {
        let options = request.filter;
        let limit = match options.get("Limit") {
            None => None,
            Some(value) => match value.as_u64() {
                Some(limit) if limit > 0 => Some(limit as usize),
                _ => {
                    return Err(BackendError::validation(
                        "Limit must be an integer greater than or equal to 1",
                    ))
                }
            },
        };
        let conditions = condition_option(&options, "FilterExpression")?;
        let start = object_option(&options, "ExclusiveStartKey")?;

        self.with_table_ref(table, |table| {
            let lower = match start {
                Some(start) => Bound::Excluded(table.storage_key(start)?),
                None => Bound::Unbounded,
            };

            let mut items = Vec::new();
            let mut scanned = 0usize;
            let mut last_evaluated = None;
            let mut range = table.items.range((lower, Bound::Unbounded)).peekable();

            // Limit 限制的是掃描筆數，過濾在其後套用
            while let Some((_, item)) = range.next() {
                scanned += 1;
                if conditions
                    .as_ref()
                    .map_or(true, |conditions| matches_all(item, conditions))
                {
                    items.push(Value::Object(item.clone()));
                }
                if limit == Some(scanned) {
                    if range.peek().is_some() {
                        last_evaluated = Some(table.key_of(item));
                    }
                    break;
                }
            }

            let count = items.len();
            let mut result = json!({
                "Items": items,
                "Count": count,
                "ScannedCount": scanned,
            });
            if let Some(key) = last_evaluated {
                result["LastEvaluatedKey"] = Value::Object(key);
            }
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new().with_table("users", &["id"])
    }

    async fn seed(store: &MemoryStore, count: usize) {
        for i in 0..count {
            store
                .put(
                    "users",
                    PutItem {
                        item: doc(json!({"id": format!("u{:02}", i), "age": i * 10})),
                        options: Document::new(),
                    },
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_put_requires_key_attributes() {
        let store = store();
        let err = store
            .put(
                "users",
                PutItem {
                    item: doc(json!({"name": "Bob"})),
                    options: Document::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "ValidationException");
        assert_eq!(err.kind, BackendErrorKind::Rejected);
    }

    #[tokio::test]
    async fn test_missing_table() {
        let store = store();
        assert!(!store.table_exists("nope").await.unwrap());
        let err = store
            .get(
                "nope",
                GetItem {
                    key: doc(json!({"id": "1"})),
                    options: Document::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::ResourceNotFound);
    }

    #[tokio::test]
    async fn test_put_returns_old_image() {
        let store = store();
        seed(&store, 1).await;

        let result = store
            .put(
                "users",
                PutItem {
                    item: doc(json!({"id": "u00", "age": 99})),
                    options: doc(json!({"ReturnValues": "ALL_OLD"})),
                },
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"Attributes": {"id": "u00", "age": 0}}));
    }

    #[tokio::test]
    async fn test_conditional_put() {
        let store = store();
        let create_once = || PutItem {
            item: doc(json!({"id": "x"})),
            options: doc(json!({"ConditionExpression": "attribute_not_exists(id)"})),
        };

        assert!(store.put("users", create_once()).await.is_ok());
        let err = store.put("users", create_once()).await.unwrap_err();
        assert_eq!(err.code, "ConditionalCheckFailedException");
    }

    #[tokio::test]
    async fn test_get_with_projection_and_wrong_key() {
        let store = store();
        seed(&store, 1).await;

        let result = store
            .get(
                "users",
                GetItem {
                    key: doc(json!({"id": "u00"})),
                    options: doc(json!({"ProjectionExpression": "age"})),
                },
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"Item": {"age": 0}}));

        let err = store
            .get(
                "users",
                GetItem {
                    key: doc(json!({"id": "u00", "extra": 1})),
                    options: Document::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "ValidationException");
    }

    #[tokio::test]
    async fn test_update_upserts_and_protects_key() {
        let store = store();

        let result = store
            .update(
                "users",
                UpdateItem {
                    key: doc(json!({"id": "new"})),
                    changes: doc(json!({
                        "UpdateExpression": "SET age = :a",
                        "ExpressionAttributeValues": {":a": 5},
                        "ReturnValues": "ALL_NEW"
                    })),
                },
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"Attributes": {"id": "new", "age": 5}}));

        let err = store
            .update(
                "users",
                UpdateItem {
                    key: doc(json!({"id": "new"})),
                    changes: doc(json!({
                        "UpdateExpression": "SET id = :other",
                        "ExpressionAttributeValues": {":other": "moved"}
                    })),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "ValidationException");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = store();
        seed(&store, 1).await;

        let delete = || DeleteItem {
            key: doc(json!({"id": "u00"})),
            options: doc(json!({"ReturnValues": "ALL_OLD"})),
        };
        let first = store.delete("users", delete()).await.unwrap();
        assert_eq!(first, json!({"Attributes": {"id": "u00", "age": 0}}));
        let second = store.delete("users", delete()).await.unwrap();
        assert_eq!(second, json!({}));
    }

    #[tokio::test]
    async fn test_scan_paginates_in_key_order() {
        let store = store();
        seed(&store, 5).await;

        let first = store
            .scan(
                "users",
                ScanItems {
                    filter: doc(json!({"Limit": 2})),
                },
            )
            .await
            .unwrap();
        assert_eq!(first["Count"], 2);
        assert_eq!(first["Items"][0]["id"], "u00");
        assert_eq!(first["LastEvaluatedKey"], json!({"id": "u01"}));

        let mut filter = doc(json!({"Limit": 10}));
        filter.insert("ExclusiveStartKey".to_string(), first["LastEvaluatedKey"].clone());
        let rest = store.scan("users", ScanItems { filter }).await.unwrap();
        assert_eq!(rest["Count"], 3);
        assert_eq!(rest["Items"][0]["id"], "u02");
        assert!(rest.get("LastEvaluatedKey").is_none());
    }

    #[tokio::test]
    async fn test_numeric_keys_compare_by_value() {
        let store = store();
        for id in [json!(2), json!(10), json!(1), json!(-3.5)] {
            store
                .put(
                    "users",
                    PutItem {
                        item: doc(json!({"id": id})),
                        options: Document::new(),
                    },
                )
                .await
                .unwrap();
        }

        let all = store.scan("users", ScanItems::default()).await.unwrap();
        assert_eq!(
            all["Items"],
            json!([{"id": -3.5}, {"id": 1}, {"id": 2}, {"id": 10}])
        );

        let page = store
            .scan(
                "users",
                ScanItems {
                    filter: doc(json!({"Limit": 2, "ExclusiveStartKey": {"id": 1.0}})),
                },
            )
            .await
            .unwrap();
        assert_eq!(page["Items"], json!([{"id": 2}, {"id": 10}]));

        let found = store
            .get(
                "users",
                GetItem {
                    key: doc(json!({"id": 1.0})),
                    options: Document::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(found, json!({"Item": {"id": 1}}));

        // 以 10.0 覆寫同一筆，而不是新增一筆
        store
            .put(
                "users",
                PutItem {
                    item: doc(json!({"id": 10.0, "v": true})),
                    options: Document::new(),
                },
            )
            .await
            .unwrap();
        let all = store.scan("users", ScanItems::default()).await.unwrap();
        assert_eq!(all["Count"], 4);
    }

    #[tokio::test]
    async fn test_update_with_equivalent_numeric_key() {
        let store = store();
        store
            .put(
                "users",
                PutItem {
                    item: doc(json!({"id": 7, "age": 1})),
                    options: Document::new(),
                },
            )
            .await
            .unwrap();

        let result = store
            .update(
                "users",
                UpdateItem {
                    key: doc(json!({"id": 7.0})),
                    changes: doc(json!({
                        "UpdateExpression": "SET age = :a",
                        "ExpressionAttributeValues": {":a": 2},
                        "ReturnValues": "ALL_NEW"
                    })),
                },
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"Attributes": {"id": 7, "age": 2}}));
    }

    #[tokio::test]
    async fn test_scan_filter_applies_after_limit() {
        let store = store();
        seed(&store, 5).await;

        let result = store
            .scan(
                "users",
                ScanItems {
                    filter: doc(json!({
                        "Limit": 3,
                        "FilterExpression": "age >= :min",
                        "ExpressionAttributeValues": {":min": 20}
                    })),
                },
            )
            .await
            .unwrap();
        assert_eq!(result["ScannedCount"], 3);
        assert_eq!(result["Count"], 1);
        assert_eq!(result["Items"][0]["id"], "u02");

        let err = store
            .scan(
                "users",
                ScanItems {
                    filter: doc(json!({"Limit": 0})),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "ValidationException");
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let store = MemoryStore::new();
        assert!(store.create_table("a", vec![]));
        assert!(!store.create_table("a", vec!["pk".to_string()]));
        assert_eq!(store.table_names(), vec!["a".to_string()]);
    }
}
