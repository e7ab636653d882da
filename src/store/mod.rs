//! The role service boundary used by HTTP handlers, the editor and the CLI.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::authz::PanelType;
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{Role, RoleCreateRequest, RoleUpdateRequest};

mod sqlite;
pub use sqlite::SqliteRoleStore;

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// All roles, or only those of one panel.
    async fn list(&self, scope: Option<PanelType>) -> AppResult<Vec<Role>>;

    async fn get(&self, id: Uuid) -> AppResult<Role>;

    async fn get_by_key(&self, key: &str) -> AppResult<Role>;

    /// Validates and normalizes the grants, derives the key, starts at version 1.
    async fn create(&self, input: &RoleCreateRequest) -> AppResult<Role>;

    /// Applies the patch if `patch.expected_version` is still current,
    /// otherwise fails with `StaleVersion`.
    async fn update(&self, id: Uuid, patch: &RoleUpdateRequest) -> AppResult<Role>;

    /// Removes a custom role nobody active holds. Returns the removed role.
    async fn delete(&self, id: Uuid) -> AppResult<Role>;
}

/// Bounds a store call. An elapsed deadline surfaces as `Unavailable`.
pub async fn with_timeout<T, F>(duration: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = duration.as_millis() as u64, "role store call timed out");
            Err(AppError::unavailable(format!(
                "role store did not answer within {} ms",
                duration.as_millis()
            )))
        }
    }
}
