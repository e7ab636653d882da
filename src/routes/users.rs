use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{roles, Action, PanelType};
use crate::db::{hotels, sessions, users};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::export::{csv_attachment, to_csv};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::jwt::AuthUser;
use crate::models::rbac::Role;
use crate::models::user::{
    normalize_email, AssignRoleRequest, InviteUserRequest, UpdateProfileRequest, User, UserListQuery,
};
use crate::response::ApiResponse;
use crate::utils::{hash_password, require};

const MODULE: &str = "users";

async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    users::fetch_user(&state.pool, user_id).await?.try_into()
}

/// Role lookup for a request body: an unknown id is the caller's mistake.
async fn requested_role(state: &AppState, role_id: Uuid) -> AppResult<Role> {
    state
        .bounded(state.roles.get(role_id))
        .await
        .map_err(|err| match err {
            AppError::NotFound(_) => AppError::validation(format!("role {} does not exist", role_id)),
            other => other,
        })
}

/// Granting the super admin role is itself privileged: a `users.*` grant is
/// not enough, whatever the enforcement mode.
fn ensure_grantable(auth: &AuthUser, role: &Role) -> AppResult<()> {
    if role.is_system_role && role.key == roles::SUPER_ADMIN && !auth.principal.is_super_admin() {
        tracing::warn!(
            user_id = %auth.user_id(),
            role = %auth.principal.role_key,
            "refused to grant super_admin"
        );
        return Err(AppError::forbidden("only a super admin can grant the super_admin role"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(UserListQuery),
    responses((status = 200, description = "Console users", body = Vec<User>)),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    QueryParams(query): QueryParams<UserListQuery>,
) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    state.authorize(&auth, &headers, MODULE, Action::View).await?;

    let rows = users::list_users(&state.pool, query.panel_type, query.include_inactive.unwrap_or(false)).await?;
    let list = rows.into_iter().map(User::try_from).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(ApiResponse::success(list)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(user_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    state.authorize(&auth, &headers, MODULE, Action::View).await?;

    Ok(Json(ApiResponse::success(load_user(&state, user_id).await?)))
}

/// Invite a user with an initial password
///
/// The panel is taken from the role's scope. Hotel-panel users must name an
/// existing hotel; admin users must not name one.
#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = InviteUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid role, hotel or password"),
        (status = 403, description = "Only a super admin can grant super_admin"),
        (status = 409, description = "Email already in use"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn invite_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    JsonBody(req): JsonBody<InviteUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    state.authorize(&auth, &headers, MODULE, Action::Create).await?;

    let (full_name, email) = req.validate()?;
    let role = requested_role(&state, req.role_id).await?;
    ensure_grantable(&auth, &role)?;

    let hotel_id = match (role.scope, req.hotel_id) {
        (PanelType::Hotel, Some(hotel_id)) => {
            hotels::fetch_hotel(&state.pool, hotel_id)
                .await
                .map_err(|_| AppError::validation(format!("hotel {} does not exist", hotel_id)))?;
            Some(hotel_id)
        }
        (PanelType::Hotel, None) => return Err(AppError::validation("hotel_id is required for hotel panel users")),
        (PanelType::Admin, Some(_)) => return Err(AppError::validation("admin panel users cannot belong to a hotel")),
        (PanelType::Admin, None) => None,
    };

    let db_user = users::insert_user(
        &state.pool,
        users::NewUser {
            email,
            full_name,
            password_hash: hash_password(&req.password)?,
            role_id: role.id,
            panel_type: role.scope,
            hotel_id,
        },
    )
    .await?;
    let user: User = db_user.try_into()?;

    log_activity_with_context(
        &state.event_bus,
        "invited",
        Some(auth.user_id()),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 409, description = "Email already in use"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(user_id): PathParam<Uuid>,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    state.authorize(&auth, &headers, MODULE, Action::Edit).await?;

    let old = load_user(&state, user_id).await?;

    let email = match &req.email {
        Some(email) => {
            let email = normalize_email(email)?;
            users::ensure_email_available(&state.pool, &email, Some(user_id)).await?;
            email
        }
        None => old.email.clone(),
    };
    let full_name = match &req.full_name {
        Some(name) => require("full_name", name)?,
        None => old.full_name.clone(),
    };

    let user: User = users::update_profile(&state.pool, user_id, &email, &full_name).await?.try_into()?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id()),
        &user,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ApiResponse::success(user)))
}

/// Reassign a user's role within the same panel
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role reassigned", body = User),
        (status = 400, description = "Role belongs to the other panel"),
        (status = 403, description = "Only a super admin can grant super_admin"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(user_id): PathParam<Uuid>,
    JsonBody(req): JsonBody<AssignRoleRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    state.authorize(&auth, &headers, MODULE, Action::Edit).await?;

    let old = load_user(&state, user_id).await?;
    let role = requested_role(&state, req.role_id).await?;
    ensure_grantable(&auth, &role)?;
    if role.scope != old.panel_type {
        return Err(AppError::validation(format!(
            "role '{}' is a {} role but the user is on the {} panel",
            role.name, role.scope, old.panel_type
        )));
    }

    let user: User = users::set_role(&state.pool, user_id, role.id).await?.try_into()?;

    log_activity_with_context(
        &state.event_bus,
        "role_assigned",
        Some(auth.user_id()),
        &user,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ApiResponse::success(user)))
}

/// Deactivate a user and end their sessions
#[utoipa::path(
    post,
    path = "/users/{id}/deactivate",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deactivated", body = User),
        (status = 403, description = "Users cannot deactivate themselves"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(user_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    state.authorize(&auth, &headers, MODULE, Action::Delete).await?;

    if user_id == auth.user_id() {
        return Err(AppError::forbidden("you cannot deactivate your own account"));
    }

    let old = load_user(&state, user_id).await?;
    let user: User = users::deactivate(&state.pool, user_id).await?.try_into()?;
    let revoked = sessions::revoke_user_sessions(&state.pool, user_id).await?;
    tracing::info!(user_id = %user_id, revoked, "user deactivated");

    log_activity_with_context(
        &state.event_bus,
        "deactivated",
        Some(auth.user_id()),
        &user,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ApiResponse::success(user)))
}

/// Download all users as users.csv
#[utoipa::path(
    get,
    path = "/users/export",
    tag = "Users",
    responses((status = 200, description = "CSV file", content_type = "text/csv")),
    security(("bearerAuth" = []))
)]
pub async fn export_users(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
) -> AppResult<Response> {
    state.authorize(&auth, &headers, MODULE, Action::Export).await?;

    let rows: Vec<Vec<String>> = users::list_users(&state.pool, None, true)
        .await?
        .into_iter()
        .map(|u| {
            vec![
                u.id.to_string(),
                u.email,
                u.full_name,
                u.role_key,
                u.panel_type,
                u.hotel_id.map(|h| h.to_string()).unwrap_or_default(),
                u.is_active.to_string(),
                u.created_at.to_rfc3339(),
            ]
        })
        .collect();

    let body = to_csv(
        &["id", "email", "full_name", "role_key", "panel_type", "hotel_id", "is_active", "created_at"],
        &rows,
    );
    Ok(csv_attachment("users", body))
}
