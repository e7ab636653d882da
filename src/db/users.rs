use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::PanelType;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::user::DbUser;
use crate::utils::utc_now;

const USER_SELECT: &str = "SELECT u.id, u.email, u.full_name, u.password_hash, u.role_id, r.key AS role_key, \
     u.panel_type, u.hotel_id, u.is_active, u.created_at, u.updated_at \
     FROM users u JOIN roles r ON r.id = u.role_id";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role_id: Uuid,
    pub panel_type: PanelType,
    pub hotel_id: Option<Uuid>,
}

pub async fn fetch_user(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    let sql = format!("{} WHERE u.id = ?", USER_SELECT);
    let row = sqlx::query(&sql)
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    row_parsers::db_user_from_row(&row)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("{} WHERE u.email = ?", USER_SELECT);
    let row = sqlx::query(&sql)
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_parsers::db_user_from_row).transpose()
}

pub async fn list_users(pool: &SqlitePool, panel: Option<PanelType>, include_inactive: bool) -> AppResult<Vec<DbUser>> {
    let mut sql = format!("{} WHERE 1 = 1", USER_SELECT);
    if panel.is_some() {
        sql.push_str(" AND u.panel_type = ?");
    }
    if !include_inactive {
        sql.push_str(" AND u.is_active = 1");
    }
    sql.push_str(" ORDER BY u.created_at, u.email");

    let mut query = sqlx::query(&sql);
    if let Some(panel) = panel {
        query = query.bind(panel.as_str());
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(row_parsers::db_user_from_row).collect()
}

pub async fn ensure_email_available(pool: &SqlitePool, email: &str, except: Option<Uuid>) -> AppResult<()> {
    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    match existing {
        Some(id) if Some(id.as_str()) != except.map(|u| u.to_string()).as_deref() => {
            Err(AppError::conflict("email already in use"))
        }
        _ => Ok(()),
    }
}

pub async fn insert_user(pool: &SqlitePool, user: NewUser) -> AppResult<DbUser> {
    ensure_email_available(pool, &user.email, None).await?;

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO users (id, email, full_name, password_hash, role_id, panel_type, hotel_id, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.password_hash)
    .bind(user.role_id.to_string())
    .bind(user.panel_type.as_str())
    .bind(user.hotel_id.map(|h| h.to_string()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_user(pool, id).await
}

pub async fn update_profile(pool: &SqlitePool, user_id: Uuid, email: &str, full_name: &str) -> AppResult<DbUser> {
    sqlx::query("UPDATE users SET email = ?, full_name = ?, updated_at = ? WHERE id = ?")
        .bind(email)
        .bind(full_name)
        .bind(utc_now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    fetch_user(pool, user_id).await
}

pub async fn set_role(pool: &SqlitePool, user_id: Uuid, role_id: Uuid) -> AppResult<DbUser> {
    sqlx::query("UPDATE users SET role_id = ?, updated_at = ? WHERE id = ?")
        .bind(role_id.to_string())
        .bind(utc_now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    fetch_user(pool, user_id).await
}

pub async fn deactivate(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    fetch_user(pool, user_id).await
}
