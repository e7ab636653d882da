use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::authz::{Action, Principal};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::audit::{AuditEntry, AuditQuery, ChainReport};

pub mod loggable;
pub use loggable::{Loggable, Severity};

const DEFAULT_AUDIT_LIMIT: i64 = 100;
const MAX_AUDIT_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, actor_id: Option<Uuid>, subject_id: Option<Uuid>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Request context for audit entries (IP, User-Agent)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    /// The current/new state of the entity
    #[serde(rename = "new")]
    pub current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
}

fn publish(event_bus: &EventBus, name: String, actor_id: Option<Uuid>, subject_id: Option<Uuid>, payload: ActivityPayload) {
    let event = DomainEvent::new(name, actor_id, subject_id, payload);
    match serde_json::to_value(&event) {
        // A send error only means nobody is listening.
        Ok(value) => {
            let _ = event_bus.send(value);
        }
        Err(e) => tracing::error!(event = %event.name, "failed to encode audit event: {}", e),
    }
}

/// Records `<entity>.<action>` for any `Loggable`, with the previous state
/// when there is one.
pub fn log_activity_with_context<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
    context: Option<RequestContext>,
) {
    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
        context,
        severity: entity.severity_for_action(action),
    };

    publish(
        event_bus,
        format!("{}.{}", T::entity_type(), action),
        actor_id,
        Some(entity.subject_id()),
        payload,
    );
}

/// Audits a check that failed but was let through in advisory mode.
pub fn log_access_denied(event_bus: &EventBus, principal: &Principal, module: &str, action: Action, context: Option<RequestContext>) {
    let payload = ActivityPayload {
        current: serde_json::json!({
            "role_key": principal.role_key,
            "panel": principal.panel,
            "module": module,
            "action": action,
        }),
        old: None,
        context,
        severity: Severity::Important,
    };

    publish(event_bus, "access.denied".to_string(), Some(principal.user_id), None, payload);
}

pub fn describe(event_name: &str) -> &'static str {
    match event_name {
        "role.created" => "Role created",
        "role.updated" => "Role updated",
        "role.permission_toggled" => "Role permission toggled",
        "role.deleted" => "Role deleted",
        "user.invited" => "User invited",
        "user.updated" => "User profile updated",
        "user.role_assigned" => "User role reassigned",
        "user.deactivated" => "User deactivated",
        "session.login" => "User logged in",
        "session.logout" => "User logged out",
        "hotel.created" => "Hotel created",
        "access.denied" => "Access denied (advisory)",
        _ => "System event",
    }
}

fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Appends one bus event to `audit_log`, chaining its hash to the last row.
pub async fn append_entry(pool: &SqlitePool, event: &Value) -> AppResult<()> {
    let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
    let severity = event
        .get("payload")
        .and_then(|p| p.get("severity"))
        .and_then(|s| s.as_str())
        .unwrap_or("important");
    let actor_id = event
        .get("actor_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let subject_id = event
        .get("subject_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let occurred_at = event
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let id = event
        .get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let payload = serde_json::to_string(event).map_err(|e| AppError::internal(format!("failed to encode event: {}", e)))?;

    let mut tx = pool.begin().await?;

    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM audit_log ORDER BY seq DESC LIMIT 1")
        .fetch_optional(&mut *tx)
        .await?;
    let hash = chain_hash(prev_hash.as_deref(), &payload);

    sqlx::query(
        "INSERT INTO audit_log (id, event_name, description, actor_id, subject_id, occurred_at, severity, payload, prev_hash, hash) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(name)
    .bind(describe(name))
    .bind(actor_id.map(|u| u.to_string()))
    .bind(subject_id.map(|u| u.to_string()))
    .bind(occurred_at)
    .bind(severity)
    .bind(&payload)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn start_audit_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("audit listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = append_entry(&pool, &event).await {
                    tracing::error!("failed to append audit entry: {}", e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged behind the event bus");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::info!("audit listener stopped");
}

pub async fn list_entries(pool: &SqlitePool, query: &AuditQuery) -> AppResult<Vec<AuditEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);

    let mut sql = String::from(
        "SELECT id, event_name, description, actor_id, subject_id, occurred_at, severity, payload, hash FROM audit_log WHERE 1 = 1",
    );
    if query.event.is_some() {
        sql.push_str(" AND event_name LIKE ? ESCAPE '\\'");
    }
    if query.actor_id.is_some() {
        sql.push_str(" AND actor_id = ?");
    }
    sql.push_str(" ORDER BY seq DESC LIMIT ?");

    let mut q = sqlx::query(&sql);
    if let Some(prefix) = &query.event {
        let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        q = q.bind(format!("{}%", escaped));
    }
    if let Some(actor_id) = query.actor_id {
        q = q.bind(actor_id.to_string());
    }
    let rows = q.bind(limit).fetch_all(pool).await?;

    rows.iter().map(row_parsers::audit_entry_from_row).collect()
}

/// Walks the chain in insertion order and reports the first row whose
/// `prev_hash` or `hash` does not match.
pub async fn verify_chain(pool: &SqlitePool) -> AppResult<ChainReport> {
    let rows = sqlx::query("SELECT id, payload, prev_hash, hash FROM audit_log ORDER BY seq ASC")
        .fetch_all(pool)
        .await?;

    let mut previous: Option<String> = None;
    for row in &rows {
        let prev_hash: Option<String> = row.try_get("prev_hash")?;
        let hash: String = row.try_get("hash")?;
        let payload: String = row.try_get("payload")?;

        if prev_hash != previous || chain_hash(prev_hash.as_deref(), &payload) != hash {
            let id: String = row.try_get("id")?;
            return Ok(ChainReport {
                entries: rows.len() as i64,
                valid: false,
                broken_at: Uuid::parse_str(&id).ok(),
            });
        }
        previous = Some(hash);
    }

    Ok(ChainReport {
        entries: rows.len() as i64,
        valid: true,
        broken_at: None,
    })
}
