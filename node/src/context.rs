//! Per-request context handed to the executor.
//!
//! Built fresh for every request and dropped once the response is written.

use axum::http::{Method, Uri};
use uuid::Uuid;

/// Viewer identity attached to every primary-endpoint request.
pub const PRIMARY_VIEWER: &str = "john_doe";

/// The parts of the inbound HTTP request recorded on the execution span.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub viewer: Option<String>,
    pub request: Option<RequestInfo>,
}

impl RequestContext {
    /// Context for the primary endpoint: request handle plus the fixed viewer.
    pub fn primary(request: RequestInfo) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            viewer: Some(PRIMARY_VIEWER.to_string()),
            request: Some(request),
        }
    }

    /// Context with no request handle and no viewer.
    pub fn empty() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            viewer: None,
            request: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_context_carries_viewer_and_request() {
        let ctx = RequestContext::primary(RequestInfo {
            method: Method::POST,
            uri: Uri::from_static("/bftx-api"),
        });
        assert_eq!(ctx.viewer.as_deref(), Some("john_doe"));
        assert_eq!(ctx.request.unwrap().method, Method::POST);
    }

    #[test]
    fn contexts_get_distinct_ids() {
        assert_ne!(
            RequestContext::empty().request_id,
            RequestContext::empty().request_id
        );
        assert!(RequestContext::empty().viewer.is_none());
    }
}
