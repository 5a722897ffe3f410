use axum::{
    Json,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::models::error::{ErrorDetail, ErrorResponse};

use super::request_id::X_REQUEST_ID;

pub async fn handle_errors(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_string();
    let method = req.method().to_string();
    let request_id = req
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        error!(
            "Server error: {} {} - Status: {} - Duration: {:?} - Request: {}",
            method, path, status, elapsed, request_id
        );
    } else if status.is_client_error() && status != StatusCode::NOT_FOUND {
        warn!(
            "Client error: {} {} - Status: {} - Duration: {:?} - Request: {}",
            method, path, status, elapsed, request_id
        );
    } else {
        debug!("{} {} - Status: {} - Duration: {:?}", method, path, status, elapsed);
    }

    response
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}

/// `CatchPanicLayer` handler. Runs inside the request span, so the log line
/// carries the request id; the id header is added on the way out.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    error!("Handler panicked: {}", panic_message(payload.as_ref()));

    let body = ErrorResponse {
        error: ErrorDetail {
            message: "Internal server error".to_string(),
            r#type: "internal_error".to_string(),
            param: None,
            code: Some("panic".to_string()),
        },
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::request_id::{add_request_id, request_span};
    use axum::{Router, http::HeaderValue, middleware, routing::get};
    use axum_test::TestServer;
    use serde_json::Value;
    use tower::ServiceBuilder;
    use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

    async fn explode() -> &'static str {
        panic!("lane table on fire")
    }

    fn app() -> Router {
        Router::new().route("/boom", get(explode)).layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(add_request_id))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(middleware::from_fn(handle_errors)),
        )
    }

    #[test]
    fn test_panic_message() {
        let owned: Box<dyn Any + Send> = Box::new("owned".to_string());
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_panic_becomes_json_error_with_request_id() {
        let server = TestServer::new(app()).unwrap();
        let response = server
            .get("/boom")
            .add_header(X_REQUEST_ID.clone(), HeaderValue::from_static("req-7"))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.header(&X_REQUEST_ID), "req-7");

        let body = response.json::<Value>();
        assert_eq!(body["error"]["code"], "panic");
        assert_eq!(body["error"]["message"], "Internal server error");
        assert!(!response.text().contains("on fire"));
    }
}
