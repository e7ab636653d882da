use chrono::Duration;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::row_parsers;
use crate::errors::AppResult;
use crate::models::session::Session;
use crate::utils::utc_now;

pub async fn create_session(pool: &SqlitePool, user_id: Uuid, ttl: Duration) -> AppResult<Session> {
    let issued_at = utc_now();
    let session = Session {
        id: Uuid::new_v4(),
        user_id,
        issued_at,
        expires_at: issued_at + ttl,
        revoked_at: None,
    };

    sqlx::query("INSERT INTO sessions (id, user_id, issued_at, expires_at, revoked_at) VALUES (?, ?, ?, ?, NULL)")
        .bind(session.id.to_string())
        .bind(user_id.to_string())
        .bind(session.issued_at)
        .bind(session.expires_at)
        .execute(pool)
        .await?;

    Ok(session)
}

pub async fn fetch_session(pool: &SqlitePool, session_id: Uuid) -> AppResult<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, issued_at, expires_at, revoked_at FROM sessions WHERE id = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_parsers::session_from_row).transpose()
}

pub async fn revoke_session(pool: &SqlitePool, session_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("UPDATE sessions SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
        .bind(utc_now())
        .bind(session_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Ends every live session of the user. Returns how many were revoked.
pub async fn revoke_user_sessions(pool: &SqlitePool, user_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query("UPDATE sessions SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL")
        .bind(utc_now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
