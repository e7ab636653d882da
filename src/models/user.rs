use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::authz::{PageDecision, PanelType, PermissionSet};
use crate::errors::{AppError, AppResult};
use crate::events::{Loggable, Severity};
use crate::models::rbac::RoleView;
use crate::models::session::SessionInfo;
use crate::utils::require;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "Ada Lovelace")]
    pub full_name: String,
    pub role_id: Uuid,
    #[schema(example = "super_admin")]
    pub role_key: String,
    pub panel_type: PanelType,
    pub hotel_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deactivated" | "role_assigned" => Severity::Critical,
            "login" | "logout" => Severity::Noise,
            _ => self.severity(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role_id: Uuid,
    pub role_key: String,
    pub panel_type: String,
    pub hotel_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        let panel_type = value
            .panel_type
            .parse()
            .map_err(|e| AppError::internal(format!("user {}: {}", value.id, e)))?;

        Ok(User {
            id: value.id,
            email: value.email,
            full_name: value.full_name,
            role_id: value.role_id,
            role_key: value.role_key,
            panel_type,
            hotel_id: value.hotel_id,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    pub session: SessionInfo,
}

/// Current user with the resolved role, as needed to render navigation.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub role: RoleView,
    #[schema(value_type = Object)]
    pub permissions: PermissionSet,
    pub is_super_admin: bool,
    pub pages: Vec<PageDecision>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InviteUserRequest {
    #[schema(example = "grace@example.com")]
    pub email: String,
    #[schema(example = "Grace Hopper")]
    pub full_name: String,
    pub role_id: Uuid,
    pub hotel_id: Option<Uuid>,
    /// Initial password, changed by the user after first login
    #[schema(example = "Temp0rary!Pass")]
    pub password: String,
}

impl InviteUserRequest {
    /// Returns the trimmed full name and lowercased email.
    pub fn validate(&self) -> AppResult<(String, String)> {
        let full_name = require("full_name", &self.full_name)?;
        let email = normalize_email(&self.email)?;
        Ok((full_name, email))
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub panel_type: Option<PanelType>,
    pub include_inactive: Option<bool>,
}

pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = require("email", email)?.to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::validation(format!("email '{}' is not valid", email)));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Ada@Example.com ").unwrap(), "ada@example.com");
        assert!(normalize_email("ada").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ada@localhost").is_err());
    }
}
