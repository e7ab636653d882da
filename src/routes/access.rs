//! Read-only authorization queries used by the consoles to render
//! navigation and hide controls. Enforcement itself happens per handler.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::app::AppState;
use crate::authz::{Action, Catalog, PageDecision, PanelType};
use crate::errors::AppResult;
use crate::extract::{PathParam, QueryParams};
use crate::jwt::AuthUser;
use crate::response::ApiResponse;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CatalogQuery {
    /// Defaults to the caller's panel
    pub panel: Option<PanelType>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckQuery {
    pub module: String,
    pub action: Action,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResponse {
    pub module: String,
    pub action: Action,
    /// Whether the caller's panel declares the action for the module
    pub declared: bool,
    pub allowed: bool,
}

#[utoipa::path(
    get,
    path = "/access/catalog",
    tag = "Access",
    params(CatalogQuery),
    responses((status = 200, description = "Modules, declared actions and page table of a panel")),
    security(("bearerAuth" = []))
)]
pub async fn catalog(
    auth: AuthUser,
    QueryParams(query): QueryParams<CatalogQuery>,
) -> AppResult<Json<ApiResponse<&'static Catalog>>> {
    let panel = query.panel.unwrap_or(auth.principal.panel);
    Ok(Json(ApiResponse::success(Catalog::for_panel(panel))))
}

#[utoipa::path(
    get,
    path = "/access/check",
    tag = "Access",
    params(CheckQuery),
    responses((status = 200, description = "Whether the caller may perform the action", body = CheckResponse)),
    security(("bearerAuth" = []))
)]
pub async fn check(
    State(state): State<AppState>,
    auth: AuthUser,
    QueryParams(query): QueryParams<CheckQuery>,
) -> AppResult<Json<ApiResponse<CheckResponse>>> {
    let declared = Catalog::for_panel(auth.principal.panel).is_declared(&query.module, query.action);
    let allowed = state.evaluator.can(&auth.principal, &query.module, query.action).await;

    Ok(Json(ApiResponse::success(CheckResponse {
        module: query.module,
        action: query.action,
        declared,
        allowed,
    })))
}

/// Navigation list: every page of the caller's panel with its allowed flag
#[utoipa::path(
    get,
    path = "/access/pages",
    tag = "Access",
    responses((status = 200, description = "Page decisions in navigation order", body = Vec<PageDecision>)),
    security(("bearerAuth" = []))
)]
pub async fn pages(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<PageDecision>>>> {
    let decisions = state
        .page_gate
        .accessible_pages(state.evaluator.as_ref(), &auth.principal)
        .await;
    Ok(Json(ApiResponse::success(decisions)))
}

/// Gate decision for one page. Without a valid session the answer is `allowed: false`.
#[utoipa::path(
    get,
    path = "/access/pages/{page_id}",
    tag = "Access",
    params(("page_id" = String, Path, description = "Page ID, e.g. audit-logs")),
    responses((status = 200, description = "Page decision", body = PageDecision))
)]
pub async fn page(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    PathParam(page_id): PathParam<String>,
) -> AppResult<Json<ApiResponse<PageDecision>>> {
    let principal = auth.as_ref().map(|a| &a.principal);
    let decision = state
        .page_gate
        .decide(state.evaluator.as_ref(), principal, &page_id)
        .await;
    Ok(Json(ApiResponse::success(decision)))
}
