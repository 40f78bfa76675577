//! The lookup HTTP surface: `GET /api/fileid/id` and `GET /api/fileid/path`.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::{bad_request, not_found, ApiError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/fileid/id", get(get_id))
        .route("/api/fileid/path", get(get_path))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct LookupResponse {
    id: String,
    path: String,
}

async fn get_id(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let Some(path) = params.get("path") else {
        return bad_request("missing query parameter `path`");
    };
    match run(&state, {
        let path = path.clone();
        move |index| index.get_id(&path)
    })
    .await
    {
        Ok(Some(id)) => Json(LookupResponse { id, path: path.clone() }).into_response(),
        Ok(None) => not_found(),
        Err(error) => error.into_response(),
    }
}

async fn get_path(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let Some(id) = params.get("id") else {
        return bad_request("missing query parameter `id`");
    };
    match run(&state, {
        let id = id.clone();
        move |index| index.get_path(&id)
    })
    .await
    {
        Ok(Some(path)) => Json(LookupResponse { id: id.clone(), path }).into_response(),
        Ok(None) => not_found(),
        Err(error) => error.into_response(),
    }
}

async fn run<F>(state: &AppState, f: F) -> Result<Option<String>, ApiError>
where
    F: FnOnce(&file_id_index::FileIdIndex) -> file_id_index::Result<Option<String>> + Send + 'static,
{
    let index = state.index.clone();
    tokio::task::spawn_blocking(move || f(&index))
        .await
        .expect("lookup task panicked")
        .map_err(ApiError::from)
}
