use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{OriginalUri, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use query_codec::{CipherKind, QueryCodec};
use shared::{
    domain::{default_query_state, QueryState},
    error::{ApiError, ErrorCode},
    protocol::{location_for, DecodedStateResponse, EncodeStateResponse, StateSource, QUERY_PARAM},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod page;

use app_state::AppState;
use config::load_settings;

/// Query string as ordered pairs, so a repeated `q` can resolve to its first value.
type QueryPairs = Vec<(String, String)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let codec_config = settings.codec_config();
    if codec_config.cipher == CipherKind::Sealed && codec_config.secret.is_default() {
        warn!("sealed query cipher is keyed with the built-in fallback secret");
    }
    let codec = QueryCodec::from_config(&codec_config).context("failed to build query codec")?;

    let state = AppState {
        codec,
        initial: default_query_state(),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, cipher = %codec_config.cipher, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/api/state", get(http_decode_state))
        .route("/api/state/encode", post(http_encode_state))
        .fallback(not_found)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(ErrorCode::NotFound, "no such route")),
    )
}

fn first_token(pairs: &QueryPairs) -> Option<&str> {
    pairs
        .iter()
        .find(|(key, _)| key == QUERY_PARAM)
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.is_empty())
}

/// Server-side state for a request, derived exactly as the client controller
/// derives it: the decoded token, or `initial` when there is nothing usable.
fn server_query_state(
    codec: &QueryCodec,
    token: Option<&str>,
    initial: &QueryState,
) -> (QueryState, StateSource) {
    match token.and_then(|t| codec.decode::<QueryState>(t)) {
        Some(decoded) => (decoded, StateSource::Token),
        None => (initial.clone(), StateSource::Default),
    }
}

async fn index(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Query(pairs): Query<QueryPairs>,
) -> Result<Html<String>, (StatusCode, Json<ApiError>)> {
    let (query_state, source) =
        server_query_state(&state.codec, first_token(&pairs), &state.initial);
    page::render(uri.path(), &query_state, source, &state.codec, &state.initial)
        .map(Html)
        .map_err(|e| {
            warn!(error = %e, "failed to render page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::internal(e.to_string())),
            )
        })
}

async fn http_decode_state(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<QueryPairs>,
) -> Json<DecodedStateResponse> {
    let (decoded, source) =
        server_query_state(&state.codec, first_token(&pairs), &state.initial);
    Json(DecodedStateResponse {
        state: decoded,
        source,
    })
}

async fn http_encode_state(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<EncodeStateResponse>, (StatusCode, Json<ApiError>)> {
    let query_state: QueryState = serde_json::from_value(body).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::validation(
                "state must be a flat JSON object of numbers and strings",
            )),
        )
    })?;

    let token = state.codec.encode(&query_state).map_err(|e| {
        warn!(error = %e, "failed to encode state");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(e.to_string())),
        )
    })?;

    Ok(Json(EncodeStateResponse {
        location: location_for("/", token.as_str()),
        token: token.into_string(),
    }))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
