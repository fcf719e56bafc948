use super::{invalid_body, ApiError, ApiResult, AppState};
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ResendConfirmationRequest {
    email: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResendConfirmationResponse {
    ok: bool,
    /// Confirmation link minted by the auth provider, when it returns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
}

pub(crate) async fn resend_confirmation(
    State(state): State<AppState>,
    body: Option<Json<ResendConfirmationRequest>>,
) -> ApiResult<ResendConfirmationResponse> {
    let Json(request) = body.ok_or_else(invalid_body)?;
    let email = request
        .email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing email".into()))?;

    let link = state.auth_admin.signup_link(&email).await?;
    Ok(Json(ResendConfirmationResponse { ok: true, link }))
}
