//! Login, logout and password endpoints

use axum::{
    debug_handler,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

use super::ApiState;
use crate::auth::{
    change_password, expired_cookie, is_authenticated, session_cookie, session_token,
    verify_password, with_cookie,
};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::models::{AuthStatus, ChangePasswordRequest, LoginRequest, MessageResponse};

#[debug_handler]
pub async fn login(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Response> {
    let store = state.store.clone();
    let config = state.config.auth.clone();
    let verified = blocking(move || verify_password(&store, &config, &request.password))
        .await??;
    if !verified {
        warn!("Failed login attempt");
        return Err(ApiError::Unauthorized("Incorrect password".to_string()));
    }
    let token = state.sessions.create();
    let cookie = session_cookie(&token, state.sessions.ttl())?;
    info!("Login succeeded");
    Ok(with_cookie(
        Json(MessageResponse::ok("Logged in")).into_response(),
        cookie,
    ))
}

#[debug_handler]
pub async fn logout(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token);
    }
    with_cookie(
        Json(MessageResponse::ok("Logged out")).into_response(),
        expired_cookie(),
    )
}

#[debug_handler]
pub async fn status(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: is_authenticated(&state, &headers),
        auth_required: state.config.auth.required,
    })
}

#[debug_handler]
pub async fn update_password(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let store = state.store.clone();
    let config = state.config.auth.clone();
    blocking(move || {
        change_password(
            &store,
            &config,
            &request.current_password,
            &request.new_password,
        )
    })
    .await??;
    Ok(Json(MessageResponse::ok("Password changed")))
}

/// Run password hashing and its store writes off the async workers
async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("Password task failed: {e}")))
}
