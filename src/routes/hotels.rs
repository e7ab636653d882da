use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Action;
use crate::db::hotels;
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, RequestContext};
use crate::extract::{JsonBody, PathParam};
use crate::jwt::AuthUser;
use crate::models::hotel::{Hotel, HotelCreateRequest};
use crate::response::ApiResponse;

const MODULE: &str = "hotels";

#[utoipa::path(
    get,
    path = "/hotels",
    tag = "Hotels",
    responses((status = 200, description = "Registered hotels", body = Vec<Hotel>)),
    security(("bearerAuth" = []))
)]
pub async fn list_hotels(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Vec<Hotel>>>> {
    state.authorize(&auth, &headers, MODULE, Action::View).await?;

    Ok(Json(ApiResponse::success(hotels::list_hotels(&state.pool).await?)))
}

#[utoipa::path(
    post,
    path = "/hotels",
    tag = "Hotels",
    request_body = HotelCreateRequest,
    responses((status = 201, description = "Hotel registered", body = Hotel)),
    security(("bearerAuth" = []))
)]
pub async fn create_hotel(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    JsonBody(req): JsonBody<HotelCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Hotel>>)> {
    state.authorize(&auth, &headers, MODULE, Action::Create).await?;

    let name = req.validate()?;
    let city = req.city.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let hotel = hotels::insert_hotel(&state.pool, &name, city).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id()),
        &hotel,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(hotel))))
}

#[utoipa::path(
    get,
    path = "/hotels/{id}",
    tag = "Hotels",
    params(("id" = Uuid, Path, description = "Hotel ID")),
    responses(
        (status = 200, description = "Hotel details", body = Hotel),
        (status = 404, description = "Hotel not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_hotel(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    PathParam(hotel_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Hotel>>> {
    state.authorize(&auth, &headers, MODULE, Action::View).await?;

    Ok(Json(ApiResponse::success(hotels::fetch_hotel(&state.pool, hotel_id).await?)))
}
