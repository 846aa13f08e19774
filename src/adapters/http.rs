use crate::core::service::{DispatchService, Reply};
use crate::domain::ports::DocumentStore;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Local gateway: `POST /` and `POST /dispatch` forward the body to the service.
pub fn router<S>(service: Arc<DispatchService<S>>) -> Router
where
    S: DocumentStore + 'static,
{
    Router::new()
        .route("/", post(dispatch_handler::<S>))
        .route("/dispatch", post(dispatch_handler::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn dispatch_handler<S>(
    State(service): State<Arc<DispatchService<S>>>,
    body: Bytes,
) -> Response
where
    S: DocumentStore + 'static,
{
    service.handle(&body).await.into_response()
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            self.body,
        )
            .into_response()
    }
}

pub async fn serve<S>(service: Arc<DispatchService<S>>, addr: SocketAddr) -> std::io::Result<()>
where
    S: DocumentStore + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🚀 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service)).await
}
