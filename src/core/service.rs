use crate::core::dispatcher::Dispatcher;
use crate::core::runtime::InvocationLimiter;
use crate::domain::model::{Outcome, Request};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{DispatchError, Result};
use serde::de::IgnoredAny;
use serde_json::error::Category;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// HTTP-shaped outcome of one invocation. `body` is the JSON text sent back.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parsed body, `null` if it is not valid JSON.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

impl From<Result<Outcome>> for Reply {
    fn from(result: Result<Outcome>) -> Self {
        match result {
            Ok(outcome) => Reply {
                status: 200,
                body: outcome.to_json_string(),
            },
            Err(e) => Reply {
                status: e.status_code(),
                body: serde_json::to_string(&e.to_body()).unwrap_or_else(|_| "null".to_string()),
            },
        }
    }
}

/// Gateway-facing entry point: raw request body in, [`Reply`] out.
pub struct DispatchService<S: DocumentStore> {
    dispatcher: Dispatcher<S>,
    limiter: InvocationLimiter,
}

impl<S: DocumentStore> DispatchService<S> {
    pub fn new(store: S, limiter: InvocationLimiter) -> Self {
        Self {
            dispatcher: Dispatcher::new(store),
            limiter,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    pub fn limiter(&self) -> &InvocationLimiter {
        &self.limiter
    }

    pub async fn handle(&self, body: &[u8]) -> Reply {
        self.handle_with_deadline(body, None).await
    }

    /// `deadline` is the time the host still grants this invocation, if known.
    pub async fn handle_with_deadline(&self, body: &[u8], deadline: Option<Duration>) -> Reply {
        let started = Instant::now();

        let request = match parse_request(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "⚠️ Rejected request body: {}",
                    e
                );
                return Reply::from(Err(e));
            }
        };

        let span = tracing::info_span!(
            "dispatch",
            operation = %request.operation_label(),
            table = %request.table_label(),
        );
        let result = self
            .limiter
            .run_with_budget(self.dispatcher.dispatch(request), deadline)
            .instrument(span.clone())
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        span.in_scope(|| match &result {
            Ok(_) => tracing::info!(elapsed_ms, "✅ Dispatched"),
            Err(e) if e.is_rejection() => tracing::warn!(
                kind = ?e.kind(),
                elapsed_ms,
                "⚠️ Rejected: {}",
                e
            ),
            Err(e) => tracing::error!(
                kind = ?e.kind(),
                retryable = e.is_retryable(),
                elapsed_ms,
                "❌ Dispatch failed: {} ({})",
                e,
                e.recovery_suggestion()
            ),
        });

        Reply::from(result)
    }
}

pub fn parse_request(body: &[u8]) -> Result<Request> {
    // 結構體也能從 JSON 陣列反序列化，先確認是物件
    let is_object = body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{');
    if !is_object {
        return Err(match serde_json::from_slice::<IgnoredAny>(body) {
            Ok(_) => DispatchError::malformed("body", "must be a JSON object"),
            Err(e) => DispatchError::malformed("body", format!("is not valid JSON ({})", e)),
        });
    }
    serde_json::from_slice(body).map_err(|e| match e.classify() {
        Category::Data => DispatchError::malformed("body", format!("has an invalid shape ({})", e)),
        _ => DispatchError::malformed("body", format!("is not valid JSON ({})", e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use serde_json::json;

    fn service() -> DispatchService<MemoryStore> {
        DispatchService::new(
            MemoryStore::new().with_table("T", &["id"]),
            InvocationLimiter::new(4, Duration::from_secs(2)),
        )
    }

    #[tokio::test]
    async fn test_spec_examples() {
        let service = service();

        let created = service
            .handle(br#"{"operation":"create","tableName":"T","payload":{"Item":{"id":"1","name":"Bob"}}}"#)
            .await;
        assert_eq!(created.status, 200);

        let malformed = service
            .handle(br#"{"operation":"update","tableName":"T","payload":{}}"#)
            .await;
        assert_eq!(malformed.status, 400);
        assert_eq!(malformed.json()["error"], "MalformedPayload");

        let unknown = service.handle(br#"{"operation":"fly","payload":{}}"#).await;
        assert_eq!(unknown.status, 400);
        assert_eq!(unknown.json()["error"], "UnrecognizedOperation");
    }

    #[tokio::test]
    async fn test_invalid_body_is_malformed() {
        let service = service();

        for body in [&b"not json"[..], b"[1,2]", b"\"ping\"", b"{\"operation\": \"ping\""] {
            let reply = service.handle(body).await;
            assert_eq!(reply.status, 400);
            assert_eq!(reply.json()["error"], "MalformedPayload");
        }
    }

    #[tokio::test]
    async fn test_missing_table_is_not_found() {
        let reply = service()
            .handle(br#"{"operation":"read","tableName":"Other","payload":{"Key":{"id":"1"}}}"#)
            .await;
        assert_eq!(reply.status, 404);
        assert_eq!(reply.json()["error"], "TargetNotFound");
    }

    #[tokio::test]
    async fn test_echo_reply() {
        let reply = service()
            .handle(br#"{"operation":"echo","payload":{"z":1,"a":"b"}}"#)
            .await;
        assert!(reply.is_success());
        assert_eq!(reply.body, r#"{"z":1,"a":"b"}"#);

        let reply = service()
            .handle(br#"{"operation":"echo","payload":{"f":1.50, "e":1e2}}"#)
            .await;
        assert_eq!(reply.body, r#"{"f":1.50, "e":1e2}"#);
    }

    #[tokio::test]
    async fn test_non_string_table_name_keeps_dispatch_order() {
        let service = service();

        let unknown = service
            .handle(br#"{"operation":"fly","tableName":5,"payload":{}}"#)
            .await;
        assert_eq!(unknown.status, 400);
        assert_eq!(unknown.json()["error"], "UnrecognizedOperation");

        let pong = service.handle(br#"{"operation":"ping","tableName":5}"#).await;
        assert_eq!(pong.status, 200);
        assert_eq!(pong.json(), json!("pong"));

        let read = service
            .handle(br#"{"operation":"read","tableName":5,"payload":{"Key":{"id":"1"}}}"#)
            .await;
        assert_eq!(read.status, 404);
        assert_eq!(read.json()["error"], "TargetNotFound");
    }

    #[test]
    fn test_reply_from_error() {
        let reply = Reply::from(Err(DispatchError::Throttled { limit: 3 }));
        assert_eq!(reply.status, 429);
        assert_eq!(
            reply.json(),
            json!({"error": "Throttled", "message": "Too many concurrent invocations (limit 3)"})
        );
    }
}
