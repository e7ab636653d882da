use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::app::AppState;
use crate::db::{sessions, users};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::extract::JsonBody;
use crate::jwt::AuthUser;
use crate::models::rbac::RoleView;
use crate::models::user::{AuthResponse, LoginRequest, MeResponse, User};
use crate::response::{ApiResponse, MessageResponse};
use crate::utils::verify_password;

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, new session issued", body = AuthResponse),
        (status = 401, description = "Invalid credentials or deactivated user")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let db_user = users::find_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }
    if !db_user.is_active {
        return Err(AppError::unauthorized("user is deactivated"));
    }

    let session = sessions::create_session(&state.pool, db_user.id, state.config.jwt.session_ttl()).await?;
    let token = state.config.jwt.encode(db_user.id, session.id, session.expires_at)?;
    let user: User = db_user.try_into()?;

    log_activity_with_context(
        &state.event_bus,
        "login",
        Some(user.id),
        &session,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ApiResponse::success(AuthResponse {
        token,
        user,
        session: session.info(),
    })))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user with role, permissions and pages", body = MeResponse),
        (status = 401, description = "No live session")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<ApiResponse<MeResponse>>> {
    let role = state.bounded(state.roles.get(auth.principal.role_id)).await?;
    let pages = state
        .page_gate
        .accessible_pages(state.evaluator.as_ref(), &auth.principal)
        .await;

    Ok(Json(ApiResponse::success(MeResponse {
        is_super_admin: auth.principal.is_super_admin(),
        permissions: auth.principal.permissions.clone(),
        role: RoleView::from(role),
        user: auth.user,
        pages,
    })))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Session revoked", body = MessageResponse)),
    security(("bearerAuth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    sessions::revoke_session(&state.pool, auth.session_id).await?;

    if let Some(session) = sessions::fetch_session(&state.pool, auth.session_id).await? {
        log_activity_with_context(
            &state.event_bus,
            "logout",
            Some(auth.user_id()),
            &session,
            None,
            Some(RequestContext::from_headers(&headers)),
        );
    }

    Ok(Json(ApiResponse::success(MessageResponse::new("Logged out"))))
}
