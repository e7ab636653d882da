use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::audit::AuditEntry;
use crate::models::hotel::Hotel;
use crate::models::rbac::DbRole;
use crate::models::session::Session;
use crate::models::user::DbUser;

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339 (what chrono binds), e.g. 2026-01-19T12:34:56.123+00:00
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP: "YYYY-MM-DD HH:MM:SS"
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

fn parse_uuid(col: &str, s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s.trim()).map_err(|e| AppError::internal(format!("invalid uuid in {}: {}", col, e)))
}

fn parse_opt_uuid(col: &str, s: Option<String>) -> Result<Option<Uuid>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_uuid(col, &s)?)),
        _ => Ok(None),
    }
}

fn get<'r, T>(row: &'r SqliteRow, col: &str) -> Result<T, AppError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(col).map_err(|e| AppError::internal(format!("missing {}: {}", col, e)))
}

/// Expects the role columns plus a computed `user_count`.
pub fn db_role_from_row(row: &SqliteRow) -> Result<DbRole, AppError> {
    let id_s: String = get(row, "id")?;
    let created_at_s: String = get(row, "created_at")?;
    let updated_at_s: String = get(row, "updated_at")?;

    Ok(DbRole {
        id: parse_uuid("id", &id_s)?,
        key: get(row, "key")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        scope: get(row, "scope")?,
        permissions: get(row, "permissions")?,
        user_count: get(row, "user_count")?,
        is_system_role: get(row, "is_system_role")?,
        version: get(row, "version")?,
        created_at: parse_datetime(&created_at_s)?,
        updated_at: parse_datetime(&updated_at_s)?,
    })
}

/// Expects the user columns plus the joined `role_key`.
pub fn db_user_from_row(row: &SqliteRow) -> Result<DbUser, AppError> {
    let id_s: String = get(row, "id")?;
    let role_id_s: String = get(row, "role_id")?;
    let hotel_id_s: Option<String> = get(row, "hotel_id")?;
    let created_at_s: String = get(row, "created_at")?;
    let updated_at_s: String = get(row, "updated_at")?;

    Ok(DbUser {
        id: parse_uuid("id", &id_s)?,
        email: get(row, "email")?,
        full_name: get(row, "full_name")?,
        password_hash: get(row, "password_hash")?,
        role_id: parse_uuid("role_id", &role_id_s)?,
        role_key: get(row, "role_key")?,
        panel_type: get(row, "panel_type")?,
        hotel_id: parse_opt_uuid("hotel_id", hotel_id_s)?,
        is_active: get(row, "is_active")?,
        created_at: parse_datetime(&created_at_s)?,
        updated_at: parse_datetime(&updated_at_s)?,
    })
}

pub fn session_from_row(row: &SqliteRow) -> Result<Session, AppError> {
    let id_s: String = get(row, "id")?;
    let user_id_s: String = get(row, "user_id")?;
    let issued_at_s: String = get(row, "issued_at")?;
    let expires_at_s: String = get(row, "expires_at")?;
    let revoked_at_s: Option<String> = get(row, "revoked_at")?;

    Ok(Session {
        id: parse_uuid("id", &id_s)?,
        user_id: parse_uuid("user_id", &user_id_s)?,
        issued_at: parse_datetime(&issued_at_s)?,
        expires_at: parse_datetime(&expires_at_s)?,
        revoked_at: parse_opt_datetime(revoked_at_s)?,
    })
}

pub fn hotel_from_row(row: &SqliteRow) -> Result<Hotel, AppError> {
    let id_s: String = get(row, "id")?;
    let created_at_s: String = get(row, "created_at")?;
    let updated_at_s: String = get(row, "updated_at")?;

    Ok(Hotel {
        id: parse_uuid("id", &id_s)?,
        name: get(row, "name")?,
        city: get(row, "city")?,
        status: get(row, "status")?,
        created_at: parse_datetime(&created_at_s)?,
        updated_at: parse_datetime(&updated_at_s)?,
    })
}

pub fn audit_entry_from_row(row: &SqliteRow) -> Result<AuditEntry, AppError> {
    let id_s: String = get(row, "id")?;
    let actor_id_s: Option<String> = get(row, "actor_id")?;
    let subject_id_s: Option<String> = get(row, "subject_id")?;
    let occurred_at_s: String = get(row, "occurred_at")?;
    let payload_s: String = get(row, "payload")?;

    let payload = serde_json::from_str(&payload_s)
        .map_err(|e| AppError::internal(format!("invalid audit payload: {}", e)))?;

    Ok(AuditEntry {
        id: parse_uuid("id", &id_s)?,
        event_name: get(row, "event_name")?,
        description: get(row, "description")?,
        actor_id: parse_opt_uuid("actor_id", actor_id_s)?,
        subject_id: parse_opt_uuid("subject_id", subject_id_s)?,
        occurred_at: parse_datetime(&occurred_at_s)?,
        severity: get(row, "severity")?,
        payload,
        hash: get(row, "hash")?,
    })
}
