//! The HTTP entry point.
//!
//! One route: `POST /` takes the JSON wire shape of a request and answers
//! with the executor's payload. Successful requests always answer 200; the
//! per-row `_error` envelopes carry authorization failures in-band. Fatal
//! planner or executor errors become a 500 with a top-level `_error`.

use crate::error::TrellisError;
use crate::request::{dispatch, Request, RequestInput};
use crate::Context;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(ctx: Arc<Context>) -> Router {
    Router::new()
        .route("/", post(handle))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Binds and serves until the process is stopped.
pub async fn run(ctx: Arc<Context>, port: u16) -> Result<(), TrellisError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(env = %ctx.config.env, %addr, "listening");

    axum::Server::bind(&addr)
        .serve(router(ctx).into_make_service())
        .await
        .map_err(|err| TrellisError::Internal {
            message: format!("server error: {err}"),
        })
}

async fn handle(
    State(ctx): State<Arc<Context>>,
    header: HeaderMap,
    Json(input): Json<RequestInput>,
) -> Response {
    let mut request = Request::set_up(input).with_header(header);

    match dispatch(&ctx, &mut request).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "_error": { "message": err.to_string() } })),
            )
                .into_response()
        }
    }
}
