use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, models, response, routes};

#[derive(OpenApi)]
#[openapi(
	info(title = "kiosk-console", description = "Hotel kiosk console: roles, permissions, users and audit"),
	paths(
		routes::health::health,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::access::catalog,
		routes::access::check,
		routes::access::pages,
		routes::access::page,
		routes::roles::list_roles,
		routes::roles::create_role,
		routes::roles::get_role,
		routes::roles::update_role,
		routes::roles::delete_role,
		routes::roles::toggle_permission,
		routes::roles::role_pages,
		routes::roles::export_roles,
		routes::users::list_users,
		routes::users::get_user,
		routes::users::invite_user,
		routes::users::update_user,
		routes::users::assign_role,
		routes::users::deactivate_user,
		routes::users::export_users,
		routes::hotels::list_hotels,
		routes::hotels::create_hotel,
		routes::hotels::get_hotel,
		routes::audit::list_audit_logs,
		routes::audit::export_audit_logs,
		routes::audit::verify_audit_chain
	),
	components(
		schemas(
			authz::Action,
			authz::PanelType,
			authz::PageAccess,
			authz::PageDecision,
			models::rbac::Role,
			models::rbac::RoleView,
			models::rbac::RoleCreateRequest,
			models::rbac::RoleUpdateRequest,
			models::rbac::TogglePermissionRequest,
			models::rbac::ToggleResult,
			models::user::User,
			models::user::LoginRequest,
			models::user::AuthResponse,
			models::user::MeResponse,
			models::user::InviteUserRequest,
			models::user::UpdateProfileRequest,
			models::user::AssignRoleRequest,
			models::session::SessionInfo,
			models::hotel::Hotel,
			models::hotel::HotelCreateRequest,
			models::audit::AuditEntry,
			models::audit::ChainReport,
			routes::access::CheckResponse,
			routes::health::HealthResponse,
			response::MessageResponse
		)
	),
	tags(
		(name = "Health", description = "Liveness and database reachability"),
		(name = "Auth", description = "Login sessions"),
		(name = "Access", description = "Catalog, permission checks and page gate"),
		(name = "Roles", description = "Roles and permission matrices"),
		(name = "Users", description = "Console user lifecycle"),
		(name = "Hotels", description = "Hotel registry"),
		(name = "Audit", description = "Hash-chained audit log")
	)
)]
pub struct ApiDoc;

/// The OpenAPI document with the bearer scheme and a local server entry.
/// Every reply is wrapped in `{ success, data?, error?, code? }`; the
/// documented bodies describe `data`.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn object_entry<'a>(parent: &'a mut Value, key: &str) -> Option<&'a mut Map<String, Value>> {
	parent
		.as_object_mut()?
		.entry(key)
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
}

fn ensure_security_components(doc: &mut Value) {
	let Some(components) = object_entry(doc, "components") else {
		return;
	};
	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));

	if let Some(schemes) = schemes.as_object_mut() {
		schemes.insert(
			"bearerAuth".to_string(),
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			}),
		);
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
