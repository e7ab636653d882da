use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::authz::{Action, Catalog, PanelType, PermissionSet};
use crate::errors::{AppError, AppResult};
use crate::events::{Loggable, Severity};
use crate::utils::{require, slugify};

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    #[schema(example = "night_auditor")]
    pub key: String,
    #[schema(example = "Night Auditor")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scope: PanelType,
    /// Module id -> granted actions
    #[schema(value_type = Object, example = json!({"audit": ["view", "export"]}))]
    pub permissions: PermissionSet,
    pub user_count: i64,
    pub is_system_role: bool,
    /// Optimistic-concurrency token, bumped on every update
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// UI hint: system roles never offer a delete control.
    pub fn can_delete(&self) -> bool {
        !self.is_system_role
    }

    pub fn catalog(&self) -> &'static Catalog {
        Catalog::for_panel(self.scope)
    }
}

impl Loggable for Role {
    fn entity_type() -> &'static str { "role" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone)]
pub struct DbRole {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub scope: String,
    pub permissions: String,
    pub user_count: i64,
    pub is_system_role: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbRole> for Role {
    type Error = AppError;

    fn try_from(db: DbRole) -> Result<Self, Self::Error> {
        let scope: PanelType = db
            .scope
            .parse()
            .map_err(|e| AppError::internal(format!("role {}: {}", db.id, e)))?;
        let permissions: PermissionSet = serde_json::from_str(&db.permissions)
            .map_err(|e| AppError::internal(format!("role {}: invalid permissions: {}", db.id, e)))?;

        Ok(Role {
            id: db.id,
            key: db.key,
            name: db.name,
            description: db.description,
            scope,
            permissions,
            user_count: db.user_count,
            is_system_role: db.is_system_role,
            version: db.version,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

/// Role as rendered in lists and matrices, with the delete hint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleView {
    #[serde(flatten)]
    pub role: Role,
    pub can_delete: bool,
}

impl From<Role> for RoleView {
    fn from(role: Role) -> Self {
        let can_delete = role.can_delete();
        RoleView { role, can_delete }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "Auditor")]
    pub name: String,
    #[schema(example = "Read-only access to the audit trail")]
    pub description: Option<String>,
    pub scope: PanelType,
    #[serde(default)]
    #[schema(value_type = Object, example = json!({"audit": ["view"]}))]
    pub permissions: PermissionSet,
}

impl RoleCreateRequest {
    /// Checks required fields and the grants against the scope's catalog.
    /// Returns the trimmed name, its key and the normalized permissions.
    pub fn validate(&self) -> AppResult<(String, String, PermissionSet)> {
        let name = require("name", &self.name)?;
        let key = slugify(&name);
        if key.is_empty() {
            return Err(AppError::validation("name must contain letters or digits"));
        }
        self.permissions.validate(Catalog::for_panel(self.scope))?;
        Ok((name, key, self.permissions.clone().normalized()))
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RoleUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub permissions: Option<PermissionSet>,
    /// The version the edit was based on
    pub expected_version: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TogglePermissionRequest {
    #[schema(example = "hotels")]
    pub module: String,
    pub action: Action,
    pub expected_version: i64,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoleListQuery {
    pub scope: Option<PanelType>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToggleResult {
    pub module: String,
    pub action: Action,
    pub granted: bool,
    pub role: RoleView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_normalizes_and_keys() {
        let req = RoleCreateRequest {
            name: "  Night Auditor ".into(),
            description: None,
            scope: PanelType::Admin,
            permissions: PermissionSet::from_grants([("audit", &[Action::Export][..])]),
        };
        let (name, key, permissions) = req.validate().unwrap();
        assert_eq!(name, "Night Auditor");
        assert_eq!(key, "night_auditor");
        assert!(permissions.allows("audit", Action::View));
    }

    #[test]
    fn test_create_request_rejects_hotel_page_on_admin_scope() {
        let req = RoleCreateRequest {
            name: "Front Desk".into(),
            description: None,
            scope: PanelType::Admin,
            permissions: PermissionSet::from_grants([("guests", &[Action::View][..])]),
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_create_request_requires_name() {
        let req = RoleCreateRequest {
            name: " ".into(),
            description: None,
            scope: PanelType::Hotel,
            permissions: PermissionSet::new(),
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }
}
