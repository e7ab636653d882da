use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::hotel::Hotel;
use crate::utils::utc_now;

const HOTEL_SELECT: &str = "SELECT id, name, city, status, created_at, updated_at FROM hotels";

pub async fn list_hotels(pool: &SqlitePool) -> AppResult<Vec<Hotel>> {
    let sql = format!("{} ORDER BY name", HOTEL_SELECT);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(row_parsers::hotel_from_row).collect()
}

pub async fn fetch_hotel(pool: &SqlitePool, hotel_id: Uuid) -> AppResult<Hotel> {
    let sql = format!("{} WHERE id = ?", HOTEL_SELECT);
    let row = sqlx::query(&sql)
        .bind(hotel_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("hotel not found"))?;

    row_parsers::hotel_from_row(&row)
}

pub async fn insert_hotel(pool: &SqlitePool, name: &str, city: Option<&str>) -> AppResult<Hotel> {
    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query("INSERT INTO hotels (id, name, city, status, created_at, updated_at) VALUES (?, ?, ?, 'active', ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(city)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

    fetch_hotel(pool, id).await
}
