use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditEntry {
    pub id: Uuid,
    #[schema(example = "role.updated")]
    pub event_name: String,
    #[schema(example = "Role updated")]
    pub description: String,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    #[schema(example = "critical")]
    pub severity: String,
    #[schema(value_type = Object)]
    pub payload: Value,
    pub hash: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Event name prefix, e.g. `role.` or `user.deactivated`
    pub event: Option<String>,
    pub actor_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChainReport {
    pub entries: i64,
    pub valid: bool,
    /// First row whose hash does not match its recomputed value
    pub broken_at: Option<Uuid>,
}
