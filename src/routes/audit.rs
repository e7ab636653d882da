use axum::{
    extract::State,
    http::HeaderMap,
    response::Response,
    Json,
};

use crate::app::AppState;
use crate::authz::Action;
use crate::errors::AppResult;
use crate::events::{list_entries, verify_chain};
use crate::export::{csv_attachment, to_csv};
use crate::extract::QueryParams;
use crate::jwt::AuthUser;
use crate::models::audit::{AuditEntry, AuditQuery, ChainReport};
use crate::response::ApiResponse;

const MODULE: &str = "audit";

/// Newest audit entries first
#[utoipa::path(
    get,
    path = "/audit-logs",
    tag = "Audit",
    params(AuditQuery),
    responses((status = 200, description = "Audit entries", body = Vec<AuditEntry>)),
    security(("bearerAuth" = []))
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    QueryParams(query): QueryParams<AuditQuery>,
) -> AppResult<Json<ApiResponse<Vec<AuditEntry>>>> {
    state.authorize(&auth, &headers, MODULE, Action::View).await?;

    Ok(Json(ApiResponse::success(list_entries(&state.pool, &query).await?)))
}

/// Download audit entries as audit-logs.csv
#[utoipa::path(
    get,
    path = "/audit-logs/export",
    tag = "Audit",
    params(AuditQuery),
    responses((status = 200, description = "CSV file", content_type = "text/csv")),
    security(("bearerAuth" = []))
)]
pub async fn export_audit_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    QueryParams(query): QueryParams<AuditQuery>,
) -> AppResult<Response> {
    state.authorize(&auth, &headers, MODULE, Action::Export).await?;

    let rows: Vec<Vec<String>> = list_entries(&state.pool, &query)
        .await?
        .into_iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                e.occurred_at.to_rfc3339(),
                e.event_name,
                e.description,
                e.actor_id.map(|a| a.to_string()).unwrap_or_default(),
                e.subject_id.map(|s| s.to_string()).unwrap_or_default(),
                e.severity,
                e.hash,
            ]
        })
        .collect();

    let body = to_csv(
        &["id", "occurred_at", "event_name", "description", "actor_id", "subject_id", "severity", "hash"],
        &rows,
    );
    Ok(csv_attachment("audit-logs", body))
}

/// Recompute the hash chain
#[utoipa::path(
    get,
    path = "/audit-logs/verify",
    tag = "Audit",
    responses((status = 200, description = "Chain integrity report", body = ChainReport)),
    security(("bearerAuth" = []))
)]
pub async fn verify_audit_chain(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<ChainReport>>> {
    state.authorize(&auth, &headers, MODULE, Action::View).await?;

    let report = verify_chain(&state.pool).await?;
    if !report.valid {
        tracing::error!(broken_at = ?report.broken_at, "audit chain verification failed");
    }
    Ok(Json(ApiResponse::success(report)))
}
