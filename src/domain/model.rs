use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{Map, Value};

/// A JSON object as exchanged with the storage backend.
pub type Document = Map<String, Value>;

/// 單次呼叫的請求內容
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Request {
    /// Kept as raw values so that a field of the wrong type is reported by
    /// the dispatcher in its usual order instead of failing deserialization.
    #[serde(default)]
    pub operation: Option<Value>,
    #[serde(default, rename = "tableName")]
    pub table_name: Option<Value>,
    /// Exact text of the payload as received.
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

impl Request {
    pub fn new(operation: &str, table_name: Option<&str>, payload: Value) -> Self {
        Self {
            operation: Some(Value::String(operation.to_string())),
            table_name: table_name.map(|name| Value::String(name.to_string())),
            payload: serde_json::value::to_raw_value(&payload).ok(),
        }
    }

    /// Operation name for log lines.
    pub fn operation_label(&self) -> String {
        label(self.operation.as_ref())
    }

    /// Table name for log lines.
    pub fn table_label(&self) -> String {
        label(self.table_name.as_ref())
    }
}

fn label(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(name)) => name.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Body produced by one dispatched request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Backend result or a diagnostic acknowledgment.
    Value(Value),
    /// Echoed payload, kept as the exact text received.
    Verbatim(Box<RawValue>),
}

impl Outcome {
    pub fn to_json_string(&self) -> String {
        match self {
            Outcome::Value(value) => value.to_string(),
            Outcome::Verbatim(raw) => raw.get().to_string(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Outcome::Value(value) => value.clone(),
            Outcome::Verbatim(raw) => serde_json::from_str(raw.get()).unwrap_or(Value::Null),
        }
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

impl PartialEq<Value> for Outcome {
    fn eq(&self, other: &Value) -> bool {
        self.to_value() == *other
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutItem {
    pub item: Document,
    /// Remaining payload fields, e.g. `ConditionExpression` or `ReturnValues`.
    pub options: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetItem {
    pub key: Document,
    pub options: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItem {
    pub key: Document,
    /// `UpdateExpression` and its attribute maps, forwarded as received.
    pub changes: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItem {
    pub key: Document,
    pub options: Document,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanItems {
    pub filter: Document,
}
