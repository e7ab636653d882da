use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{roles, Catalog, PanelType, PermissionSet};
use crate::db::users::{self, NewUser};
use crate::errors::{AppError, AppResult};
use crate::models::user::{normalize_email, DbUser};
use crate::utils::{hash_password, require, utc_now};

struct SystemRole {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    scope: PanelType,
}

const SYSTEM_ROLES: [SystemRole; 2] = [
    SystemRole {
        key: roles::SUPER_ADMIN,
        name: "Super Admin",
        description: "Unrestricted access to the admin console",
        scope: PanelType::Admin,
    },
    SystemRole {
        key: roles::HOTEL_MANAGER,
        name: "Hotel Manager",
        description: "Every page of the hotel console",
        scope: PanelType::Hotel,
    },
];

/// Inserts the built-in roles that are missing. Safe to run repeatedly;
/// existing rows are left untouched. Returns how many were inserted.
pub async fn seed_system_roles(pool: &SqlitePool) -> AppResult<u64> {
    let mut inserted = 0;

    for role in SYSTEM_ROLES.iter() {
        let permissions = PermissionSet::full(Catalog::for_panel(role.scope));
        let permissions_json = serde_json::to_string(&permissions)
            .map_err(|e| AppError::internal(format!("failed to encode permissions: {}", e)))?;
        let now = utc_now();

        let result = sqlx::query(
            "INSERT INTO roles (id, key, name, description, scope, permissions, is_system_role, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, 1, ?, ?) ON CONFLICT(key) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(role.key)
        .bind(role.name)
        .bind(role.description)
        .bind(role.scope.as_str())
        .bind(permissions_json)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(role = role.key, "seeded system role");
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Creates an active user holding the `super_admin` role, seeding roles first.
pub async fn create_super_admin(pool: &SqlitePool, email: &str, full_name: &str, password: &str) -> AppResult<DbUser> {
    seed_system_roles(pool).await?;

    let role_id: String = sqlx::query_scalar("SELECT id FROM roles WHERE key = ?")
        .bind(roles::SUPER_ADMIN)
        .fetch_one(pool)
        .await?;
    let role_id = Uuid::parse_str(&role_id).map_err(|e| AppError::internal(format!("invalid role id: {}", e)))?;

    users::insert_user(
        pool,
        NewUser {
            email: normalize_email(email)?,
            full_name: require("full_name", full_name)?,
            password_hash: hash_password(password)?,
            role_id,
            panel_type: PanelType::Admin,
            hotel_id: None,
        },
    )
    .await
}
