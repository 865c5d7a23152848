//! # HTTP API
//!
//! Builds the axum router that exposes the gateway's HTTP interface. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method   | Path        | Description                                  |
//! |----------|-------------|----------------------------------------------|
//! | GET/POST | `/bftx-api` | Primary endpoint; status follows the errors  |
//! | GET/POST | `/graphql`  | Explorer endpoint; always 200 once decoded   |
//! | GET      | `/`         | GraphiQL explorer page                       |

mod explorer;
mod request;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use bftx_protocol::TransactionLifecycle;

use crate::context::{RequestContext, RequestInfo};
use crate::executor::{Executor, GraphQLRequest};
use crate::metrics::SharedMetrics;
use crate::schema::Schema;

pub use request::request_options;

const PRIMARY_ENDPOINT: &str = "bftx-api";
const EXPLORER_ENDPOINT: &str = "graphql";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone; everything sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Executor bound to the immutable schema and the ledger.
    pub executor: Arc<Executor>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(
        schema: Arc<Schema>,
        lifecycle: Arc<dyn TransactionLifecycle>,
        metrics: SharedMetrics,
    ) -> Self {
        let executor = Executor::new(schema, lifecycle).with_metrics(Arc::clone(&metrics));
        Self {
            executor: Arc::new(executor),
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/bftx-api", get(primary_handler).post(primary_handler))
        .route(
            "/graphql",
            get(explorer_query_handler).post(explorer_query_handler),
        )
        .route("/", get(explorer::explorer_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET|POST /bftx-api`
///
/// The first error decides the status: its numeric message if it has one,
/// else 500.
async fn primary_handler(State(state): State<AppState>, request: Request) -> Response {
    let started = Instant::now();
    let info = RequestInfo {
        method: request.method().clone(),
        uri: request.uri().clone(),
    };
    let options = request_options(request).await;
    let ctx = RequestContext::primary(info);

    let result = state.executor.execute(&options, &ctx).await;
    let status = result.status();

    let response = match serde_json::to_vec(&result) {
        Ok(body) => (status, [(CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!(request_id = %ctx.request_id, error = %e, "failed to encode response");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    };

    info!(
        request_id = %ctx.request_id,
        viewer = ?ctx.viewer,
        operation = ?options.operation_name,
        errors = result.errors.len(),
        status = response.status().as_u16(),
        "primary request served"
    );
    state.metrics.observe_request(
        PRIMARY_ENDPOINT,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Body accepted by `/graphql`; anything besides `query` is ignored.
#[derive(Debug, Deserialize)]
struct ExplorerQuery {
    #[serde(default)]
    query: String,
}

/// `GET|POST /graphql`
///
/// The body is read whatever the method, so a body-less GET fails to decode.
/// Undecodable bodies get 500 with the decoder's message as plain text.
/// Everything else is 200, errors or not.
async fn explorer_query_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let started = Instant::now();
    let response = match serde_json::from_slice::<ExplorerQuery>(&body) {
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Ok(ExplorerQuery { query }) => {
            let ctx = RequestContext::empty();
            let options = GraphQLRequest {
                query,
                ..Default::default()
            };
            let result = state.executor.execute(&options, &ctx).await;
            match serde_json::to_vec(&result) {
                Ok(mut body) => {
                    body.push(b'\n');
                    (StatusCode::OK, [(CONTENT_TYPE, "application/json")], body).into_response()
                }
                Err(e) => {
                    error!(request_id = %ctx.request_id, error = %e, "failed to encode response");
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
                }
            }
        }
    };

    state.metrics.observe_request(
        EXPLORER_ENDPOINT,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
