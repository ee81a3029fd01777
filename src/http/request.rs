//! Request identification.
//!
//! # Responsibilities
//! - Name the request ID header shared by every layer
//! - Read the ID back out of a request for logging
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (outermost layer)
//! - An ID supplied by the client is kept, otherwise a UUID is generated

use axum::http::{HeaderMap, HeaderName, Request};

/// Header carrying the request ID in both directions.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Access to the request ID set by the request-id layer.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> Option<&str> {
        self.get(X_REQUEST_ID).and_then(|value| value.to_str().ok())
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers().request_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_request_id_from_header() {
        let request = Request::builder()
            .header("X-Request-ID", "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request.request_id(), Some("abc-123"));

        let bare = Request::new(Body::empty());
        assert_eq!(bare.request_id(), None);
    }
}
