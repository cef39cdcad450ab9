//! Conversion of dispatch results into HTTP responses.
//!
//! # Design Decisions
//! - Every fetch failure maps to 500 with the terminal error text as body
//! - The serving source is always reported in `x-modproxy-source`
//! - Archives keep their announced length so clients can show progress

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::dispatch::dispatcher::{DispatchError, Fetched, Payload};
use crate::module::RequestKind;

/// Header naming the source that produced (or failed) the response.
pub const X_MODPROXY_SOURCE: &str = "x-modproxy-source";

/// Content type served for each resource kind.
pub fn content_type(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::VersionInfo | RequestKind::Latest => "application/json",
        RequestKind::Archive => "application/zip",
        RequestKind::VersionList | RequestKind::Manifest | RequestKind::Unknown => {
            "text/plain; charset=utf-8"
        }
    }
}

impl IntoResponse for Fetched {
    fn into_response(self) -> Response {
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type(self.kind))
            .header(X_MODPROXY_SOURCE, self.source.as_str());

        let body = match self.payload {
            Payload::Buffered(bytes) => Body::from(bytes),
            Payload::Streaming(stream) => {
                if let Some(len) = stream.content_length() {
                    builder = builder.header(header::CONTENT_LENGTH, len);
                }
                stream.into_body()
            }
        };

        builder
            .body(body)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let mut response =
            (StatusCode::INTERNAL_SERVER_ERROR, self.error.to_string()).into_response();
        response
            .headers_mut()
            .insert(X_MODPROXY_SOURCE, HeaderValue::from_static(self.source.as_str()));
        response
    }
}
