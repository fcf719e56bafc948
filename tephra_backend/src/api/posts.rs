use super::{
    invalid_body, parse_index, require_caller, ApiError, ApiResult, AppState, RecordPageResponse,
    RecordsResponse,
};
use crate::records::{ListQuery, RecordDraft};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ListPostsParams {
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePostRequest {
    title: Option<String>,
    content: Option<String>,
    likes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateLikesRequest {
    id: Option<String>,
    likes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeletePostRequest {
    id: Option<String>,
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListPostsParams>,
) -> ApiResult<RecordPageResponse> {
    let query = ListQuery::new(
        None,
        parse_index(params.page.as_deref()),
        parse_index(params.limit.as_deref()),
        state.posts.spec(),
    );
    let page = state.posts.list(&query).await?;
    Ok(Json(RecordPageResponse {
        data: page.records,
        total: page.total,
        page: query.page,
        limit: query.limit,
    }))
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CreatePostRequest>>,
) -> ApiResult<RecordsResponse> {
    let caller = require_caller(&state, &headers).await?;
    let Json(request) = body.ok_or_else(invalid_body)?;
    let title = request
        .title
        .filter(|title| !title.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing title".into()))?;
    let content = request
        .content
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing content".into()))?;

    let draft = RecordDraft::post(&title, &content, request.likes, &caller.author_stamp());
    let data = state.posts.create(&draft).await?;
    Ok(Json(RecordsResponse { data }))
}

pub(crate) async fn update_likes(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<UpdateLikesRequest>>,
) -> ApiResult<RecordsResponse> {
    let caller = require_caller(&state, &headers).await?;
    let Json(request) = body.ok_or_else(invalid_body)?;
    let id = request
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing id".into()))?;
    let likes = request
        .likes
        .ok_or_else(|| ApiError::BadRequest("Missing likes".into()))?;

    let data = state.posts.set_likes(&id, likes, &caller).await?;
    Ok(Json(RecordsResponse { data }))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<DeletePostRequest>>,
) -> ApiResult<RecordsResponse> {
    let caller = require_caller(&state, &headers).await?;
    let Json(request) = body.ok_or_else(invalid_body)?;
    let id = request
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing id".into()))?;

    let data = state.posts.delete(&id, &caller).await?;
    Ok(Json(RecordsResponse { data }))
}
