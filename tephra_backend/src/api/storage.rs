use super::{invalid_body, ApiError, ApiResult, AppState};
use crate::storage::clamp_ttl;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub(crate) struct ListObjectsParams {
    prefix: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListObjectsResponse {
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignedUrlRequest {
    path: Option<String>,
    expires: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignedUrlResponse {
    /// Provider response passed through untouched; clients read whichever
    /// URL field their SDK version expects.
    data: Value,
}

pub(crate) async fn list_objects(
    State(state): State<AppState>,
    Query(params): Query<ListObjectsParams>,
) -> ApiResult<ListObjectsResponse> {
    let prefix = params.prefix.unwrap_or_default();
    let data = state.storage.list(&prefix).await;
    Ok(Json(ListObjectsResponse { data }))
}

pub(crate) async fn create_signed_url(
    State(state): State<AppState>,
    body: Option<Json<SignedUrlRequest>>,
) -> ApiResult<SignedUrlResponse> {
    let Json(request) = body.ok_or_else(invalid_body)?;
    let path = request
        .path
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing path".into()))?;
    // Path traversal check runs before the provider sees the request.
    if path.contains("..") {
        return Err(ApiError::BadRequest("Invalid path".into()));
    }

    let ttl = clamp_ttl(request.expires);
    let data = state.storage.signed_url(&path, ttl).await?;
    Ok(Json(SignedUrlResponse { data }))
}
