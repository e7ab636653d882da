//! Role management endpoints.
//!
//! Every mutation is audited with Critical severity. Updates and toggles
//! carry `expected_version` and fail with 409 when another edit landed first.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, PageAccess};
use crate::editor::RoleEditor;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::export::{csv_attachment, to_csv};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::jwt::AuthUser;
use crate::models::rbac::*;
use crate::response::{ApiResponse, MessageResponse};

const MODULE: &str = "roles";

/// List roles, optionally for one panel
#[utoipa::path(
    get,
    path = "/roles",
    tag = "Roles",
    params(RoleListQuery),
    responses(
        (status = 200, description = "Roles with their permission matrices", body = Vec<RoleView>),
        (status = 403, description = "Missing roles.view"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    QueryParams(query): QueryParams<RoleListQuery>,
) -> AppResult<Json<ApiResponse<Vec<RoleView>>>> {
    state.authorize(&auth, &headers, MODULE, Action::View).await?;

    let roles = state.bounded(state.roles.list(query.scope)).await?;
    Ok(Json(ApiResponse::success(roles.into_iter().map(RoleView::from).collect())))
}

/// Create a custom role
#[utoipa::path(
    post,
    path = "/roles",
    tag = "Roles",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = RoleView),
        (status = 400, description = "Unknown module or undeclared action"),
        (status = 409, description = "Role name already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    JsonBody(req): JsonBody<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RoleView>>)> {
    state.authorize(&auth, &headers, MODULE, Action::Create).await?;

    let role = state.bounded(state.roles.create(&req)).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id()),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(role.into()))))
}

/// Get a role by ID
#[utoipa::path(
    get,
    path = "/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role details", body = RoleView),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(role_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<RoleView>>> {
    state.authorize(&auth, &headers, MODULE, Action::View).await?;

    let role = state.bounded(state.roles.get(role_id)).await?;
    Ok(Json(ApiResponse::success(role.into())))
}

/// Update name, description or the whole permission set
#[utoipa::path(
    put,
    path = "/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleView),
        (status = 409, description = "Role changed since it was loaded"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(role_id): PathParam<Uuid>,
    JsonBody(req): JsonBody<RoleUpdateRequest>,
) -> AppResult<Json<ApiResponse<RoleView>>> {
    state.authorize(&auth, &headers, MODULE, Action::Edit).await?;

    let old = state.bounded(state.roles.get(role_id)).await?;
    let role = state.bounded(state.roles.update(role_id, &req)).await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id()),
        &role,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ApiResponse::success(role.into())))
}

/// Delete a custom role
#[utoipa::path(
    delete,
    path = "/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role deleted", body = MessageResponse),
        (status = 403, description = "System roles cannot be deleted"),
        (status = 409, description = "Role is still assigned"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(role_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    state.authorize(&auth, &headers, MODULE, Action::Delete).await?;

    let role = state.bounded(state.roles.delete(role_id)).await?;

    log_activity_with_context(
        &state.event_bus,
        "deleted",
        Some(auth.user_id()),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ApiResponse::success(MessageResponse::new(format!("role '{}' deleted", role.name)))))
}

/// Flip one cell of the permission matrix
///
/// Turning `view` off clears the module; granting any other action grants `view`.
#[utoipa::path(
    post,
    path = "/roles/{id}/toggle",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = TogglePermissionRequest,
    responses(
        (status = 200, description = "Cell toggled", body = ToggleResult),
        (status = 400, description = "Action not declared for the module"),
        (status = 409, description = "Role changed since it was loaded"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn toggle_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(role_id): PathParam<Uuid>,
    JsonBody(req): JsonBody<TogglePermissionRequest>,
) -> AppResult<Json<ApiResponse<ToggleResult>>> {
    state.authorize(&auth, &headers, MODULE, Action::Edit).await?;

    let old = state.bounded(state.roles.get(role_id)).await?;
    if old.version != req.expected_version {
        return Err(AppError::StaleVersion {
            expected: req.expected_version,
            current: old.version,
        });
    }

    let mut editor = RoleEditor::new(old.clone());
    let granted = editor.toggle(&req.module, req.action)?;
    let role = editor.save(state.roles.as_ref(), state.config.store_timeout).await?;

    log_activity_with_context(
        &state.event_bus,
        "permission_toggled",
        Some(auth.user_id()),
        &role,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ApiResponse::success(ToggleResult {
        module: req.module,
        action: req.action,
        granted,
        role: role.into(),
    })))
}

/// Hotel-panel page toggles of a role
#[utoipa::path(
    get,
    path = "/roles/{id}/pages",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Pages with their enabled flag; empty for admin roles", body = Vec<PageAccess>),
    ),
    security(("bearerAuth" = []))
)]
pub async fn role_pages(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(role_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<PageAccess>>>> {
    state.authorize(&auth, &headers, MODULE, Action::View).await?;

    let role = state.bounded(state.roles.get(role_id)).await?;
    Ok(Json(ApiResponse::success(role.permissions.page_access(role.catalog()))))
}

/// Download all roles as roles.csv
#[utoipa::path(
    get,
    path = "/roles/export",
    tag = "Roles",
    responses((status = 200, description = "CSV file", content_type = "text/csv")),
    security(("bearerAuth" = []))
)]
pub async fn export_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
) -> AppResult<Response> {
    state.authorize(&auth, &headers, MODULE, Action::Export).await?;

    let roles = state.bounded(state.roles.list(None)).await?;
    let rows: Vec<Vec<String>> = roles
        .iter()
        .map(|role| {
            vec![
                role.id.to_string(),
                role.key.clone(),
                role.name.clone(),
                role.description.clone().unwrap_or_default(),
                role.scope.to_string(),
                role.is_system_role.to_string(),
                role.user_count.to_string(),
                role.version.to_string(),
                format_permissions(role),
            ]
        })
        .collect();

    let body = to_csv(
        &["id", "key", "name", "description", "scope", "is_system_role", "user_count", "version", "permissions"],
        &rows,
    );
    Ok(csv_attachment("roles", body))
}

/// `hotels:view|create; audit:view`
fn format_permissions(role: &Role) -> String {
    role.permissions
        .modules()
        .map(|(module, actions)| {
            let actions: Vec<&str> = actions.iter().map(|a| a.as_str()).collect();
            format!("{}:{}", module, actions.join("|"))
        })
        .collect::<Vec<_>>()
        .join("; ")
}
