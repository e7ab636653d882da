use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::RoleStore;
use crate::authz::{PanelType, PermissionSet};
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{Role, RoleCreateRequest, RoleUpdateRequest};
use crate::utils::{require, utc_now};

const ROLE_SELECT: &str = "SELECT r.id, r.key, r.name, r.description, r.scope, r.permissions, r.is_system_role, r.version, \
     r.created_at, r.updated_at, \
     (SELECT COUNT(1) FROM users u WHERE u.role_id = r.id AND u.is_active = 1) AS user_count \
     FROM roles r";

#[derive(Clone)]
pub struct SqliteRoleStore {
    pool: SqlitePool,
}

impl SqliteRoleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_one(&self, clause: &str, value: &str) -> AppResult<Option<Role>> {
        let sql = format!("{} WHERE {}", ROLE_SELECT, clause);
        let row = sqlx::query(&sql).bind(value).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Ok(Some(Role::try_from(row_parsers::db_role_from_row(&row)?)?)),
            None => Ok(None),
        }
    }

    async fn ensure_unique(&self, scope: PanelType, name: &str, key: &str, except: Option<Uuid>) -> AppResult<()> {
        let clash: Option<(String, String, String)> = sqlx::query_as(
            "SELECT key, scope, name FROM roles WHERE (key = ? OR (scope = ? AND name = ?)) AND id != ? LIMIT 1",
        )
        .bind(key)
        .bind(scope.as_str())
        .bind(name)
        .bind(except.map(|id| id.to_string()).unwrap_or_default())
        .fetch_optional(&self.pool)
        .await?;

        match clash {
            Some((_, clash_scope, clash_name)) if clash_scope == scope.as_str() && clash_name == name => {
                Err(AppError::conflict(format!("a role named '{}' already exists", name)))
            }
            Some((clash_key, _, clash_name)) => Err(AppError::conflict(format!(
                "role key '{}' is already taken by role '{}'",
                clash_key, clash_name
            ))),
            None => Ok(()),
        }
    }
}

fn encode_permissions(permissions: &PermissionSet) -> AppResult<String> {
    serde_json::to_string(permissions).map_err(|e| AppError::internal(format!("failed to encode permissions: {}", e)))
}

#[async_trait]
impl RoleStore for SqliteRoleStore {
    async fn list(&self, scope: Option<PanelType>) -> AppResult<Vec<Role>> {
        let rows = match scope {
            Some(scope) => {
                let sql = format!("{} WHERE r.scope = ? ORDER BY r.is_system_role DESC, r.name", ROLE_SELECT);
                sqlx::query(&sql).bind(scope.as_str()).fetch_all(&self.pool).await?
            }
            None => {
                let sql = format!("{} ORDER BY r.scope, r.is_system_role DESC, r.name", ROLE_SELECT);
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        rows.iter()
            .map(|row| row_parsers::db_role_from_row(row).and_then(Role::try_from))
            .collect()
    }

    async fn get(&self, id: Uuid) -> AppResult<Role> {
        self.fetch_one("r.id = ?", &id.to_string())
            .await?
            .ok_or_else(|| AppError::not_found("role not found"))
    }

    async fn get_by_key(&self, key: &str) -> AppResult<Role> {
        self.fetch_one("r.key = ?", key)
            .await?
            .ok_or_else(|| AppError::not_found(format!("role '{}' not found", key)))
    }

    async fn create(&self, input: &RoleCreateRequest) -> AppResult<Role> {
        let (name, key, permissions) = input.validate()?;
        self.ensure_unique(input.scope, &name, &key, None).await?;

        let id = Uuid::new_v4();
        let now = utc_now();
        let description = input.description.as_deref().map(str::trim).filter(|d| !d.is_empty());

        sqlx::query(
            "INSERT INTO roles (id, key, name, description, scope, permissions, is_system_role, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&key)
        .bind(&name)
        .bind(description)
        .bind(input.scope.as_str())
        .bind(encode_permissions(&permissions)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::info!(role_id = %id, key = %key, scope = %input.scope, "role created");
        self.get(id).await
    }

    async fn update(&self, id: Uuid, patch: &RoleUpdateRequest) -> AppResult<Role> {
        let current = self.get(id).await?;
        if current.version != patch.expected_version {
            return Err(AppError::StaleVersion {
                expected: patch.expected_version,
                current: current.version,
            });
        }

        let name = match &patch.name {
            Some(name) => {
                let name = require("name", name)?;
                if name != current.name {
                    if current.is_system_role {
                        return Err(AppError::forbidden("system roles cannot be renamed"));
                    }
                    self.ensure_unique(current.scope, &name, &current.key, Some(id)).await?;
                }
                name
            }
            None => current.name.clone(),
        };

        let description = match &patch.description {
            Some(d) => Some(d.trim().to_string()).filter(|d| !d.is_empty()),
            None => current.description.clone(),
        };

        let permissions = match &patch.permissions {
            Some(set) => {
                set.validate(current.catalog())?;
                set.clone().normalized()
            }
            None => current.permissions.clone(),
        };

        let result = sqlx::query(
            "UPDATE roles SET name = ?, description = ?, permissions = ?, version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ?",
        )
        .bind(&name)
        .bind(&description)
        .bind(encode_permissions(&permissions)?)
        .bind(utc_now())
        .bind(id.to_string())
        .bind(patch.expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Lost the race between the read above and the write.
            let latest = self.get(id).await?;
            return Err(AppError::StaleVersion {
                expected: patch.expected_version,
                current: latest.version,
            });
        }

        let updated = self.get(id).await?;
        tracing::info!(role_id = %id, version = updated.version, "role updated");
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> AppResult<Role> {
        let role = self.get(id).await?;
        if role.is_system_role {
            return Err(AppError::forbidden("system roles cannot be deleted"));
        }

        let assigned: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE role_id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        if role.user_count > 0 {
            return Err(AppError::conflict(format!(
                "role '{}' is held by {} active user(s)",
                role.name, role.user_count
            )));
        }
        if assigned > 0 {
            return Err(AppError::conflict(format!(
                "role '{}' is still referenced by deactivated users",
                role.name
            )));
        }

        sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        tracing::info!(role_id = %id, key = %role.key, "role deleted");
        Ok(role)
    }
}
