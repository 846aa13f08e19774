use crate::domain::model::{
    DeleteItem, Document, GetItem, Outcome, PutItem, Request, ScanItems, UpdateItem,
};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{DispatchError, Result};
use serde_json::value::RawValue;
use serde_json::Value;

/// Fixed acknowledgment returned by `ping`.
pub const PING_ACK: &str = "pong";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
    Echo,
    Ping,
}

/// 路由表：新增操作只需要在這裡登記並補上對應的 Command
pub const ROUTES: &[(&str, Operation)] = &[
    ("create", Operation::Create),
    ("read", Operation::Read),
    ("update", Operation::Update),
    ("delete", Operation::Delete),
    ("list", Operation::List),
    ("echo", Operation::Echo),
    ("ping", Operation::Ping),
];

impl Operation {
    pub fn from_name(name: &str) -> Option<Self> {
        ROUTES
            .iter()
            .find(|(route, _)| *route == name)
            .map(|(_, operation)| *operation)
    }

    /// Resolves the raw `operation` field of a request. Anything that is not a
    /// known name (including a missing or non-string value) is rejected.
    pub fn resolve(raw: Option<&Value>) -> Result<Self> {
        match raw {
            Some(Value::String(name)) => {
                Self::from_name(name).ok_or_else(|| DispatchError::UnrecognizedOperation {
                    operation: name.clone(),
                })
            }
            Some(other) => Err(DispatchError::UnrecognizedOperation {
                operation: other.to_string(),
            }),
            None => Err(DispatchError::UnrecognizedOperation {
                operation: String::new(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        ROUTES
            .iter()
            .find(|(_, operation)| *operation == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    pub fn requires_table(self) -> bool {
        !matches!(self, Operation::Echo | Operation::Ping)
    }

    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Operation::Create | Operation::Update | Operation::Delete
        )
    }

    /// Checks the structural fields this operation needs and splits the
    /// payload into the arguments of the matching backend primitive.
    pub fn prepare(self, payload: Option<Box<RawValue>>) -> Result<Command> {
        match self {
            Operation::Echo => Ok(Command::Echo(payload)),
            Operation::Ping => Ok(Command::Ping),
            Operation::Create => {
                let mut options = payload_object(payload)?;
                let item = take_object(&mut options, "Item")?;
                Ok(Command::Create(PutItem { item, options }))
            }
            Operation::Read => {
                let mut options = payload_object(payload)?;
                let key = take_key(&mut options)?;
                Ok(Command::Read(GetItem { key, options }))
            }
            Operation::Update => {
                let mut changes = payload_object(payload)?;
                let key = take_key(&mut changes)?;
                Ok(Command::Update(UpdateItem { key, changes }))
            }
            Operation::Delete => {
                let mut options = payload_object(payload)?;
                let key = take_key(&mut options)?;
                Ok(Command::Delete(DeleteItem { key, options }))
            }
            Operation::List => Ok(Command::List(ScanItems {
                filter: payload_object(payload)?,
            })),
        }
    }
}

/// A validated request, ready to run.
#[derive(Debug, Clone)]
pub enum Command {
    Create(PutItem),
    Read(GetItem),
    Update(UpdateItem),
    Delete(DeleteItem),
    List(ScanItems),
    Echo(Option<Box<RawValue>>),
    Ping,
}

impl Command {
    async fn execute<S: DocumentStore + ?Sized>(self, store: &S, table: &str) -> Result<Outcome> {
        let result = match self {
            Command::Create(request) => store.put(table, request).await?,
            Command::Read(request) => store.get(table, request).await?,
            Command::Update(request) => store.update(table, request).await?,
            Command::Delete(request) => store.delete(table, request).await?,
            Command::List(request) => store.scan(table, request).await?,
            Command::Echo(Some(payload)) => return Ok(Outcome::Verbatim(payload)),
            Command::Echo(None) => Value::Null,
            Command::Ping => Value::String(PING_ACK.to_string()),
        };
        Ok(Outcome::Value(result))
    }
}

fn payload_object(payload: Option<Box<RawValue>>) -> Result<Document> {
    let Some(raw) = payload else {
        return Ok(Document::new());
    };
    let value: Value = serde_json::from_str(raw.get())
        .map_err(|e| DispatchError::malformed("payload", format!("is not valid JSON ({})", e)))?;
    match value {
        Value::Null => Ok(Document::new()),
        Value::Object(map) => Ok(map),
        _ => Err(DispatchError::malformed("payload", "must be a JSON object")),
    }
}

fn take_object(payload: &mut Document, field: &str) -> Result<Document> {
    match payload.remove(field) {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(DispatchError::malformed(field, "must be a JSON object")),
        None => Err(DispatchError::malformed(field, "is required")),
    }
}

fn take_key(payload: &mut Document) -> Result<Document> {
    let key = take_object(payload, "Key")?;
    if key.is_empty() {
        return Err(DispatchError::malformed("Key", "must name at least one attribute"));
    }
    Ok(key)
}

/// Routes requests to a document store. Holds no per-request state, so one
/// instance is shared by every concurrent invocation.
pub struct Dispatcher<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> Dispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn dispatch(&self, request: Request) -> Result<Outcome> {
        let Request {
            operation,
            table_name,
            payload,
        } = request;

        // 順序固定：先查路由，再檢查 tableName 與 payload，最後才碰後端
        let operation = Operation::resolve(operation.as_ref())?;
        let table = if operation.requires_table() {
            Some(required_table_name(table_name.as_ref())?)
        } else {
            None
        };
        let command = operation.prepare(payload)?;

        match table {
            Some(table) => {
                self.resolve_table(table).await?;
                tracing::debug!("Routing '{}' to table '{}'", operation.name(), table);
                command.execute(&self.store, table).await
            }
            None => command.execute(&self.store, "").await,
        }
    }

    async fn resolve_table(&self, table: &str) -> Result<()> {
        if self.store.table_exists(table).await? {
            Ok(())
        } else {
            Err(DispatchError::TargetNotFound {
                message: format!("table '{}' does not exist", table),
            })
        }
    }
}

fn required_table_name(table_name: Option<&Value>) -> Result<&str> {
    match table_name {
        Some(Value::String(name)) if !name.trim().is_empty() => Ok(name),
        Some(Value::String(_)) | Some(Value::Null) | None => Err(DispatchError::TargetNotFound {
            message: "tableName is required for this operation".to_string(),
        }),
        Some(other) => Err(DispatchError::TargetNotFound {
            message: format!("tableName {} does not name a table", other),
        }),
    }
}
