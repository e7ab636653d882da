use std::time::Duration;

use crate::authz::{AuthzMode, UnmappedPagePolicy};
use crate::errors::AppError;
use crate::jwt::JwtConfig;

const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub authz_mode: AuthzMode,
    pub unmapped_pages: UnmappedPagePolicy,
    pub store_timeout: Duration,
}

impl AppConfig {
    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            jwt,
            authz_mode: AuthzMode::default(),
            unmapped_pages: UnmappedPagePolicy::default(),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let jwt = JwtConfig::from_env()?;

        let authz_mode = match std::env::var("AUTHZ_MODE") {
            Ok(value) if !value.trim().is_empty() => value.trim().parse().map_err(AppError::configuration)?,
            _ => AuthzMode::default(),
        };

        let unmapped_pages = match std::env::var("UNMAPPED_PAGE_POLICY") {
            Ok(value) if !value.trim().is_empty() => value.trim().parse().map_err(AppError::configuration)?,
            _ => UnmappedPagePolicy::default(),
        };

        let store_timeout_ms = std::env::var("STORE_TIMEOUT_MS")
            .map(|val| val.parse::<u64>())
            .unwrap_or(Ok(DEFAULT_STORE_TIMEOUT_MS))
            .map_err(|_| AppError::configuration("STORE_TIMEOUT_MS must be a valid integer"))?;

        Ok(Self {
            jwt,
            authz_mode,
            unmapped_pages,
            store_timeout: Duration::from_millis(store_timeout_ms),
        })
    }

    pub fn with_authz_mode(mut self, mode: AuthzMode) -> Self {
        self.authz_mode = mode;
        self
    }

    pub fn with_unmapped_pages(mut self, policy: UnmappedPagePolicy) -> Self {
        self.unmapped_pages = policy;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}
