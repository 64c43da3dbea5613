//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router over a ready host
//! - Wire up middleware (tracing, request ID, request context)
//! - Serve static files from the web root
//! - Dispatch everything else through the route table
//! - Open one service scope per request
//! - Render errors per environment

use std::io;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::di::{DiError, ServiceProvider, ServiceScope};
use crate::hosting::{AppInformation, HostEnvironment};
use crate::http::request::{request_context_middleware, X_REQUEST_ID};
use crate::lifecycle::shutdown;
use crate::lifecycle::ReadyHost;
use crate::observability::{RequestLogStore, RequestLogger};
use crate::routing::{RouteTable, RouteValues};
use crate::services::BookCatalog;
use crate::storage::StoreError;

/// Path the production error response points clients at.
pub const ERROR_PATH: &str = "/Home/Error";

/// Path prefix for files under the web root.
pub const STATIC_PREFIX: &str = "/static";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub provider: ServiceProvider,
    pub routes: Arc<RouteTable>,
    pub environment: Arc<HostEnvironment>,
}

/// HTTP front of a ready host.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(host: &ReadyHost) -> Result<Self, DiError> {
        let provider = host.provider().clone();
        let state = AppState {
            routes: provider.get::<RouteTable>()?,
            environment: host.environment().clone(),
            provider,
        };
        let router = Self::build_router(state);
        Ok(Self { router })
    }

    fn build_router(state: AppState) -> Router {
        let web_root = state.environment.web_root().to_path_buf();
        Router::new()
            .nest_service(STATIC_PREFIX, ServeDir::new(web_root))
            .fallback(dispatch)
            .with_state(state)
            .layer(middleware::from_fn(request_context_middleware))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Route-table dispatch. Each request gets its own service scope.
async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let Some(matched) = state.routes.match_path(uri.path()) else {
        tracing::debug!(path = %uri.path(), "No route matched");
        return StatusCode::NOT_FOUND.into_response();
    };

    let scope = state.provider.create_scope();
    let controller = matched.values.controller().unwrap_or_default().to_ascii_lowercase();
    let action = matched.values.action().unwrap_or_default().to_ascii_lowercase();

    let result = match (controller.as_str(), action.as_str()) {
        ("home", "index") => home_index(&scope),
        ("home", "logs") => home_logs(&scope, &matched.values),
        ("home", "error") => Ok(error_page(&request_id, StatusCode::OK)),
        _ => Ok(StatusCode::NOT_FOUND.into_response()),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(request_id = %request_id, error = %err, "Request failed");
            error_response(&state.environment, &request_id, &err)
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum HandlerError {
    #[error(transparent)]
    Resolve(#[from] DiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn home_index(scope: &ServiceScope) -> Result<Response, HandlerError> {
    let logger = scope.get::<RequestLogger>()?;
    let catalog = scope.get::<dyn BookCatalog>()?;
    let info = scope.get::<AppInformation>()?;

    let books = catalog.list()?;
    logger.info(format_args!("Rendering Home/Index with {} books", books.len()));

    Ok(Json(json!({
        "branch": info.branch_name(),
        "bookCount": books.len(),
        "books": books,
    }))
    .into_response())
}

fn home_logs(scope: &ServiceScope, values: &RouteValues) -> Result<Response, HandlerError> {
    let Some(id) = values.id() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let store = scope.get::<RequestLogStore>()?;
    let records: Vec<_> = store
        .get(id)
        .into_iter()
        .map(|r| {
            json!({
                "level": r.level.as_str(),
                "category": r.category,
                "message": r.message,
            })
        })
        .collect();

    if records.is_empty() {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    Ok(Json(json!({ "requestId": id, "records": records })).into_response())
}

fn error_page(request_id: &str, status: StatusCode) -> Response {
    (
        status,
        Json(json!({
            "error": "An error occurred while processing your request.",
            "errorPage": ERROR_PATH,
            "requestId": request_id,
        })),
    )
        .into_response()
}

/// Development responses carry the error chain; everything else gets the
/// generic error page.
fn error_response(
    environment: &HostEnvironment,
    request_id: &str,
    err: &(dyn std::error::Error + 'static),
) -> Response {
    if !environment.is_development() {
        return error_page(request_id, StatusCode::INTERNAL_SERVER_ERROR);
    }

    let mut chain = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        chain.push(e.to_string());
        current = e.source();
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": err.to_string(),
            "chain": chain,
            "requestId": request_id,
        })),
    )
        .into_response()
}
