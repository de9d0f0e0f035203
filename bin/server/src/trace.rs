//! Request trace correlation.
//!
//! Every request carries a trace identifier: taken from the inbound
//! `x-request-id` header when present, minted as a ULID otherwise. The id
//! is parked in request extensions for audit entries and error bodies, and
//! echoed on the response so callers can quote it to support.

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, request::Parts},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

/// Header carrying the trace identifier in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The trace identifier attached to the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(String);

impl TraceId {
    /// Creates a trace id from an inbound header value.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Mints a fresh trace id.
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Returns the trace id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S> FromRequestParts<S> for TraceId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // The propagate middleware runs first on every route; the fallback
        // only fires for services mounted without it.
        Ok(parts
            .extensions
            .get::<TraceId>()
            .cloned()
            .unwrap_or_else(TraceId::generate))
    }
}

/// Middleware that assigns the request's trace id and echoes it back.
pub async fn propagate(mut req: Request, next: Next) -> Response {
    let trace_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| TraceId::new(v.to_string()))
        .unwrap_or_else(TraceId::generate);

    req.extensions_mut().insert(trace_id.clone());

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request as HttpRequest, middleware, routing::get};
    use tower::ServiceExt;

    async fn echo_trace(trace: TraceId) -> String {
        trace.as_str().to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(echo_trace))
            .layer(middleware::from_fn(propagate))
    }

    #[tokio::test]
    async fn inbound_header_is_propagated() {
        let response = app()
            .oneshot(
                HttpRequest::get("/")
                    .header(REQUEST_ID_HEADER, "trace-abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).map(|v| v.to_str().expect("ascii")),
            Some("trace-abc")
        );
    }

    #[tokio::test]
    async fn missing_header_mints_an_id() {
        let response = app()
            .oneshot(HttpRequest::get("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        let echoed = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .expect("trace header");
        assert!(!echoed.is_empty());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TraceId::generate(), TraceId::generate());
    }
}
