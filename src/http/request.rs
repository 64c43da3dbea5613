//! Request identification and request context.
//!
//! # Responsibilities
//! - Assign a request ID (incoming `x-request-id` or a fresh UUID v4)
//! - Run the rest of the pipeline inside the request's logging context
//! - Echo the request ID on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The context lives in a task-local; loggers resolve it per call

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::observability::{RequestContext, TaskLocalRequestContext};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID as seen by handlers.
pub fn request_id<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
}

pub async fn request_context_middleware(mut req: Request<Body>, next: Next) -> Response {
    let (request_id, header) = match request_id(&req)
        .filter(|id| !id.is_empty())
        .and_then(|id| Some((id.to_string(), HeaderValue::from_str(id).ok()?)))
    {
        Some(existing) => existing,
        None => {
            let id = Uuid::new_v4().to_string();
            // A hyphenated UUID is always a valid header value.
            let header = HeaderValue::from_str(&id).unwrap_or(HeaderValue::from_static("invalid"));
            (id, header)
        }
    };
    req.headers_mut().insert(X_REQUEST_ID, header.clone());

    let context = RequestContext::new(
        request_id.as_str(),
        req.method().as_str(),
        req.uri().path(),
    );

    let mut response = TaskLocalRequestContext::scope(context, next.run(req)).await;
    response.headers_mut().insert(X_REQUEST_ID, header);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{RequestContextAccessor, TaskLocalRequestContext};
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|| async {
                    TaskLocalRequestContext
                        .current()
                        .map(|ctx| ctx.request_id)
                        .unwrap_or_default()
                }),
            )
            .layer(middleware::from_fn(request_context_middleware))
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, id.as_bytes());
    }

    #[tokio::test]
    async fn test_keeps_incoming_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(X_REQUEST_ID, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get(X_REQUEST_ID).unwrap(), "abc-123");
    }
}
