mod auth;
mod comments;
mod posts;
mod status;
mod storage;

use crate::config::GatewayConfig;
use crate::error::StoreError;
use crate::gateway::RecordGateway;
use crate::identity::{AuthAdmin, AuthAdminError, Caller, IdentityError, IdentityResolver};
use crate::records::{Record, COMMENTS, POSTS};
use crate::storage::{StorageClient, StorageError};
use crate::store::{LocalStore, RemoteStore};
use crate::utils::APP_NAME;
use anyhow::{Context, Result};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub http_client: reqwest::Client,
    pub resolver: IdentityResolver,
    pub auth_admin: AuthAdmin,
    pub storage: StorageClient,
    pub posts: RecordGateway,
    pub comments: RecordGateway,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    /// A dependent platform service refused or is unconfigured; the
    /// message is safe to show the caller.
    Service(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { error: msg }),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorResponse { error: msg })
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorResponse { error: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { error: msg }),
            ApiError::Service(msg) => {
                tracing::error!(message = %msg, "dependent service failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse { error: msg },
                )
            }
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingBearer => {
                ApiError::Unauthorized("Missing Authorization Bearer token".into())
            }
            IdentityError::Rejected => {
                ApiError::Unauthorized("Invalid or expired access token".into())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Not found".into()),
            StoreError::Denied => ApiError::Forbidden("Not allowed".into()),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Transport(err) => ApiError::Internal(err.into()),
            other => ApiError::Service(other.to_string()),
        }
    }
}

impl From<AuthAdminError> for ApiError {
    fn from(err: AuthAdminError) -> Self {
        match err {
            AuthAdminError::Transport(err) => ApiError::Internal(err.into()),
            other => ApiError::Service(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Envelope for single-record mutations; always an array on the wire so
/// remote rows and fallback rows look identical to clients.
#[derive(Debug, Serialize)]
pub(crate) struct RecordsResponse {
    pub data: Vec<Record>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RecordPageResponse {
    pub data: Vec<Record>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

/// Resolves the caller from the `Authorization` header. Runs before any
/// store I/O; a rejected token never touches a record.
pub(crate) async fn require_caller(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Caller, ApiError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    Ok(state.resolver.resolve(authorization).await?)
}

/// Pagination params arrive as raw strings; anything unparsable reads as
/// absent and takes the collection default.
pub(crate) fn parse_index(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|value| value.parse().ok())
}

/// Body extractors run as `Option<Json<T>>` so malformed JSON becomes a
/// uniform 400 instead of axum's default rejection shape.
pub(crate) fn invalid_body() -> ApiError {
    ApiError::BadRequest("Invalid JSON in request body".into())
}

pub fn build_state(config: GatewayConfig, http_client: reqwest::Client) -> AppState {
    let resolver = IdentityResolver::new(http_client.clone(), config.remote.clone());
    let auth_admin = AuthAdmin::new(http_client.clone(), config.remote.clone());
    let storage = StorageClient::new(
        http_client.clone(),
        config.remote.clone(),
        config.storage.bucket.clone(),
    );
    let posts_remote = config
        .remote
        .clone()
        .map(|remote| RemoteStore::new(http_client.clone(), remote, POSTS));
    let comments_remote = config
        .remote
        .clone()
        .map(|remote| RemoteStore::new(http_client.clone(), remote, COMMENTS));
    let posts = RecordGateway::new(
        POSTS,
        posts_remote,
        LocalStore::new(POSTS, config.paths.posts_file.clone()),
    );
    let comments = RecordGateway::new(
        COMMENTS,
        comments_remote,
        LocalStore::new(COMMENTS, config.paths.comments_file.clone()),
    );
    AppState {
        config,
        http_client,
        resolver,
        auth_admin,
        storage,
        posts,
        comments,
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health_handler))
        .route(
            "/posts",
            get(posts::list_posts)
                .post(posts::create_post)
                .patch(posts::update_likes)
                .delete(posts::delete_post),
        )
        .route(
            "/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/storage/list", get(storage::list_objects))
        .route("/storage/signed-url", post(storage::create_signed_url))
        .route("/auth/resend-confirmation", post(auth::resend_confirmation))
        .route("/debug/report", get(status::debug_report))
        .route(
            "/inspect",
            get(status::inspect_info).post(status::inspect_echo),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port + offset;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port + MAX_PORT_ATTEMPTS - 1
    )
}

/// One client for every outbound call the process makes; reqwest pools
/// connections per client, so sharing it keeps the remote sockets warm.
pub fn shared_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("tephra/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("failed to build shared HTTP client")
}

pub async fn serve_http(config: GatewayConfig) -> Result<()> {
    let http_client = shared_http_client()?;
    let state = build_state(config, http_client);
    let requested_port = state.config.api_port;
    let remote_configured = state.config.remote.is_some();
    let router = build_router(state);

    let (listener, actual_port) = find_available_port(requested_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != requested_port {
        tracing::warn!(
            requested_port,
            actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(
        ?addr,
        app = APP_NAME,
        remote_configured,
        "HTTP server listening"
    );
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
