//! Response construction helpers.
//!
//! # Responsibilities
//! - Build small text responses for router and edge failures
//! - Map upstream failures to gateway status codes
//!
//! # Design Decisions
//! - Request-time errors always become HTTP responses
//! - Unreachable targets map to 502, elapsed deadlines to 504

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

/// Build a `text/plain` response with the given status and body.
pub fn text_response(status: StatusCode, body: impl Into<String>) -> Response<Body> {
    let mut response = Response::new(Body::from(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

pub fn not_found() -> Response<Body> {
    text_response(StatusCode::NOT_FOUND, "Not Found")
}

pub fn bad_gateway(message: impl Into<String>) -> Response<Body> {
    text_response(StatusCode::BAD_GATEWAY, message)
}

pub fn gateway_timeout() -> Response<Body> {
    text_response(StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response_sets_content_type() {
        let response = text_response(StatusCode::IM_A_TEAPOT, "short and stout");
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
