//! HTTP server: routing, JSON responses and the catch-all error boundary

use futures_util::FutureExt;
use hyper::body::HttpBody;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info};
use utoipa::openapi::OpenApi;

use prices_common::{ErrorCode, ErrorEnvelope};

use crate::dispatcher::AverageDispatcher;
use crate::docs;
use crate::handler::{self, ApiError, AverageResponse};

/// Endpoint path below the route prefix
pub const AVERAGE_PRICES_PATH: &str = "/average-prices";
/// Public query-string endpoint, never prefixed
pub const GATEWAY_PATH: &str = "/prices/average";
pub const HEALTH_PATH: &str = "/health";
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 4 * 1024;

const BODY_TOO_LARGE: &str = "request body exceeds 4096 bytes";

/// Shared, read-only state handed to every request
pub struct AppState {
    dispatcher: AverageDispatcher,
    average_path: String,
    openapi: OpenApi,
}

impl AppState {
    pub fn new(dispatcher: AverageDispatcher, route_prefix: &str) -> Self {
        let average_path = format!(
            "{}{}",
            route_prefix.trim_end_matches('/'),
            AVERAGE_PRICES_PATH
        );
        Self {
            dispatcher,
            openapi: docs::openapi(&average_path),
            average_path,
        }
    }

    pub fn average_path(&self) -> &str {
        &self.average_path
    }

    pub fn dispatcher(&self) -> &AverageDispatcher {
        &self.dispatcher
    }
}

/// Handle one request. Never fails: errors and panics become a 500 envelope.
pub async fn handle_request(state: Arc<AppState>, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match AssertUnwindSafe(route(&state, req)).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            error!("{} {} failed: {}", method, path, err);
            error_response(&err)
        }
        Err(_) => {
            error!("{} {} panicked", method, path);
            error_response(&ApiError::Internal("handler panicked".to_string()))
        }
    }
}

async fn route(state: &AppState, req: Request<Body>) -> Result<Response<Body>, ApiError> {
    let path = req.uri().path().to_string();

    if path == state.average_path() {
        if req.method() != Method::POST {
            return Ok(text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
        }
        let result = match read_body(req.into_body()).await {
            Ok(body) => handler::average_prices(state.dispatcher(), &body).await,
            Err(err) => Err(err),
        };
        return respond(result);
    }

    if path == GATEWAY_PATH {
        if req.method() != Method::GET {
            return Ok(text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
        }
        let query = req.uri().query().unwrap_or_default();
        return respond(handler::average_prices_query(state.dispatcher(), query).await);
    }

    match (req.method(), path.as_str()) {
        (&Method::GET, HEALTH_PATH) => Ok(text_response(StatusCode::OK, "OK")),
        (&Method::GET, OPENAPI_PATH) => Ok(json_response(StatusCode::OK, &state.openapi)),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "Not Found")),
    }
}

/// Collect the body, giving up once it passes [`MAX_BODY_BYTES`]
async fn read_body(mut body: Body) -> Result<Vec<u8>, ApiError> {
    if body.size_hint().lower() > MAX_BODY_BYTES as u64 {
        return Err(ApiError::InvalidDateRange(BODY_TOO_LARGE));
    }

    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk =
            chunk.map_err(|e| ApiError::Internal(format!("failed to read request body: {}", e)))?;
        if buf.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(ApiError::InvalidDateRange(BODY_TOO_LARGE));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn respond(result: Result<AverageResponse, ApiError>) -> Result<Response<Body>, ApiError> {
    match result {
        Ok(response) => Ok(json_response(StatusCode::OK, &response)),
        Err(err @ ApiError::Internal(_)) => Err(err),
        Err(err) => {
            debug!("Responding {} {}", err.status_code(), err.code());
            Ok(error_response(&err))
        }
    }
}

/// Serialize `value` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("Failed to serialize response body: {}", e);
            internal_error_response()
        }
    }
}

pub fn error_response(err: &ApiError) -> Response<Body> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &err.envelope())
}

fn internal_error_response() -> Response<Body> {
    let envelope = ErrorEnvelope::from_code(ErrorCode::InternalError);
    let body = format!(
        r#"{{"code":"{}","message":"{}"}}"#,
        envelope.code, envelope.message
    );
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn text_response(status: StatusCode, text: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// Serve until `shutdown` resolves, then finish in-flight requests.
pub async fn serve<F>(addr: SocketAddr, state: Arc<AppState>, shutdown: F) -> hyper::Result<()>
where
    F: Future<Output = ()>,
{
    let make_svc = make_service_fn(move |_conn| {
        let state = Arc::clone(&state);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, Infallible>(handle_request(state, req).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!("Listening on http://{}", server.local_addr());
    info!("OpenAPI document at http://{}{}", server.local_addr(), OPENAPI_PATH);

    server.with_graceful_shutdown(shutdown).await
}
