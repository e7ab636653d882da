use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{Action, AuthzMode, DefaultPolicyEvaluator, PageGate, PanelType, PolicyEvaluator};
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::events::{init_event_bus, log_access_denied, start_audit_listener, EventBus, RequestContext};
use crate::jwt::AuthUser;
use crate::routes::{access, audit, auth, health, hotels, roles, users};
use crate::store::{with_timeout, RoleStore, SqliteRoleStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub evaluator: Arc<dyn PolicyEvaluator>,
    pub page_gate: PageGate,
    pub roles: Arc<dyn RoleStore>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig, event_bus: EventBus) -> Self {
        Self {
            roles: Arc::new(SqliteRoleStore::new(pool.clone())),
            evaluator: Arc::new(DefaultPolicyEvaluator::new()),
            page_gate: PageGate::new(config.unmapped_pages),
            config: Arc::new(config),
            pool,
            event_bus,
        }
    }

    /// Enforces `module.action` of the admin console for the caller according
    /// to the configured mode. Advisory mode records the denial and lets the
    /// call through.
    ///
    /// Hotel-panel principals never pass: both catalogs declare `dashboard`,
    /// `support` and `settings`, and a hotel page grant must not open the
    /// admin module of the same name.
    pub async fn authorize(&self, auth: &AuthUser, headers: &HeaderMap, module: &str, action: Action) -> AppResult<()> {
        if self.config.authz_mode == AuthzMode::Off {
            return Ok(());
        }

        if auth.principal.panel == PanelType::Admin && self.evaluator.can(&auth.principal, module, action).await {
            return Ok(());
        }

        match self.config.authz_mode {
            AuthzMode::Advisory => {
                tracing::warn!(
                    user_id = %auth.principal.user_id,
                    role = %auth.principal.role_key,
                    module = %module,
                    action = %action,
                    "permission denied (advisory mode, allowing)"
                );
                log_access_denied(
                    &self.event_bus,
                    &auth.principal,
                    module,
                    action,
                    Some(RequestContext::from_headers(headers)),
                );
                Ok(())
            }
            _ => Err(AppError::forbidden(format!("missing permission {}.{}", module, action))),
        }
    }

    /// Runs a role store call under the configured deadline.
    pub async fn bounded<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: std::future::Future<Output = AppResult<T>>,
    {
        with_timeout(self.config.store_timeout, fut).await
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AppConfig::from_env()?;
    create_app_with(pool, config).await
}

/// Builds the router and spawns the audit listener for `pool`.
pub async fn create_app_with(pool: SqlitePool, config: AppConfig) -> Result<Router, AppError> {
    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_audit_listener(rx, pool.clone()));

    tracing::info!(
        authz_mode = ?config.authz_mode,
        unmapped_pages = ?config.unmapped_pages,
        "authorization configured"
    );

    let state = AppState::new(pool, config, event_bus);
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let access_routes = Router::new()
        .route("/catalog", get(access::catalog))
        .route("/check", get(access::check))
        .route("/pages", get(access::pages))
        .route("/pages/:page_id", get(access::page));

    let role_routes = Router::new()
        .route("/", get(roles::list_roles).post(roles::create_role))
        .route("/export", get(roles::export_roles))
        .route("/:id", get(roles::get_role).put(roles::update_role).delete(roles::delete_role))
        .route("/:id/toggle", post(roles::toggle_permission))
        .route("/:id/pages", get(roles::role_pages));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::invite_user))
        .route("/export", get(users::export_users))
        .route("/:id", get(users::get_user).put(users::update_user))
        .route("/:id/role", put(users::assign_role))
        .route("/:id/deactivate", post(users::deactivate_user));

    let hotel_routes = Router::new()
        .route("/", get(hotels::list_hotels).post(hotels::create_hotel))
        .route("/:id", get(hotels::get_hotel));

    let audit_routes = Router::new()
        .route("/", get(audit::list_audit_logs))
        .route("/export", get(audit::export_audit_logs))
        .route("/verify", get(audit::verify_audit_chain));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/access", access_routes)
        .nest("/roles", role_routes)
        .nest("/users", user_routes)
        .nest("/hotels", hotel_routes)
        .nest("/audit-logs", audit_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
