use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::events::Loggable;
use crate::utils::require;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Hotel {
    pub id: Uuid,
    #[schema(example = "Harbour View Hotel")]
    pub name: String,
    #[schema(example = "Lisbon")]
    pub city: Option<String>,
    #[schema(example = "active")]
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Hotel {
    fn entity_type() -> &'static str { "hotel" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HotelCreateRequest {
    #[schema(example = "Harbour View Hotel")]
    pub name: String,
    #[schema(example = "Lisbon")]
    pub city: Option<String>,
}

impl HotelCreateRequest {
    pub fn validate(&self) -> AppResult<String> {
        require("name", &self.name)
    }
}
