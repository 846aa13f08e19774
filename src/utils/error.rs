use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// 後端自行分類的失敗種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// 後端拒絕了參數（例如 ValidationException、條件檢查失敗）
    Rejected,
    /// 表或資源不存在
    ResourceNotFound,
    /// 後端自身的吞吐量限制
    Throttled,
    /// 網路或服務暫時不可用
    Unavailable,
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Rejected, "ValidationException", message)
    }

    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::new(
            BackendErrorKind::ResourceNotFound,
            "ResourceNotFoundException",
            message,
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            BackendErrorKind::Throttled | BackendErrorKind::Unavailable
        )
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unrecognized operation: '{operation}'")]
    UnrecognizedOperation { operation: String },

    #[error("Malformed payload: field '{field}' {reason}")]
    MalformedPayload { field: String, reason: String },

    #[error("Backend target not found: {message}")]
    TargetNotFound { message: String },

    #[error("Backend failure: {0}")]
    BackendFailure(BackendError),

    #[error("Too many concurrent invocations (limit {limit})")]
    Throttled { limit: usize },

    #[error("Invocation exceeded its time budget of {}ms", .budget.as_millis())]
    Timeout { budget: Duration },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

/// 對外回應使用的錯誤種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    UnrecognizedOperation,
    MalformedPayload,
    TargetNotFound,
    BackendFailure,
    Throttled,
    Timeout,
    InternalError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
}

impl From<BackendError> for DispatchError {
    fn from(err: BackendError) -> Self {
        // 表不存在一律視為目標不存在，而不是後端故障
        match err.kind {
            BackendErrorKind::ResourceNotFound => DispatchError::TargetNotFound {
                message: err.message,
            },
            _ => DispatchError::BackendFailure(err),
        }
    }
}

impl DispatchError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DispatchError::MalformedPayload {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::UnrecognizedOperation { .. } => ErrorKind::UnrecognizedOperation,
            DispatchError::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            DispatchError::TargetNotFound { .. } => ErrorKind::TargetNotFound,
            DispatchError::BackendFailure(_) => ErrorKind::BackendFailure,
            DispatchError::Throttled { .. } => ErrorKind::Throttled,
            DispatchError::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::InternalError,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::UnrecognizedOperation { .. } | DispatchError::MalformedPayload { .. } => {
                400
            }
            DispatchError::TargetNotFound { .. } => 404,
            DispatchError::Throttled { .. } => 429,
            DispatchError::Timeout { .. } => 504,
            DispatchError::BackendFailure(err) => match err.kind {
                BackendErrorKind::Rejected => 400,
                BackendErrorKind::ResourceNotFound => 404,
                BackendErrorKind::Throttled | BackendErrorKind::Unavailable => 503,
                BackendErrorKind::Internal => 502,
            },
            _ => 500,
        }
    }

    /// Whether a caller may reasonably resend the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Throttled { .. } | DispatchError::Timeout { .. } => true,
            DispatchError::BackendFailure(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Request-path failures that never reached the backend.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DispatchError::UnrecognizedOperation { .. }
                | DispatchError::MalformedPayload { .. }
                | DispatchError::TargetNotFound { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DispatchError::UnrecognizedOperation { .. } => {
                "Use one of: create, read, update, delete, list, echo, ping"
            }
            DispatchError::MalformedPayload { .. } => {
                "Check the payload fields required by the operation"
            }
            DispatchError::TargetNotFound { .. } => "Provide an existing tableName",
            DispatchError::BackendFailure(err) if err.is_transient() => {
                "Backend is busy or unavailable, retry later"
            }
            DispatchError::BackendFailure(_) => "Inspect the backend error message",
            DispatchError::Throttled { .. } => "Retry with backoff",
            DispatchError::Timeout { .. } => {
                "Retry later; mutations may or may not have been applied"
            }
            DispatchError::ConfigError { .. }
            | DispatchError::InvalidConfigValueError { .. }
            | DispatchError::MissingConfigError { .. } => "Check the configuration values",
            DispatchError::IoError(_) | DispatchError::SerializationError(_) => {
                "Check file paths and contents"
            }
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
