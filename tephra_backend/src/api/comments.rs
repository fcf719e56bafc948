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
pub(crate) struct ListCommentsParams {
    /// Accepts the legacy camelCase spelling from older clients.
    #[serde(alias = "postId")]
    post_id: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateCommentRequest {
    post_id: Option<String>,
    content: Option<String>,
    parent_id: Option<String>,
}

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    Query(params): Query<ListCommentsParams>,
) -> ApiResult<RecordPageResponse> {
    let post_id = params
        .post_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing post_id".into()))?;

    let query = ListQuery::new(
        Some(post_id),
        parse_index(params.page.as_deref()),
        parse_index(params.limit.as_deref()),
        state.comments.spec(),
    );
    let page = state.comments.list(&query).await?;
    Ok(Json(RecordPageResponse {
        data: page.records,
        total: page.total,
        page: query.page,
        limit: query.limit,
    }))
}

pub(crate) async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CreateCommentRequest>>,
) -> ApiResult<RecordsResponse> {
    let caller = require_caller(&state, &headers).await?;
    let Json(request) = body.ok_or_else(invalid_body)?;
    let post_id = request
        .post_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing post_id".into()))?;
    let content = request
        .content
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing content".into()))?;
    // a blank parent reads as a top-level comment, not a thread under ""
    let parent_id = request.parent_id.as_deref().filter(|id| !id.trim().is_empty());

    let draft = RecordDraft::comment(&post_id, &content, parent_id, &caller.author_stamp());
    let data = state.comments.create(&draft).await?;
    Ok(Json(RecordsResponse { data }))
}
