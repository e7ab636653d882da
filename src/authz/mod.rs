//! Authorization module - permission catalog, policy engine and page gate
//!
//! This module implements the RBAC model shared by both consoles:
//! - A static catalog of modules, their applicable actions and page mappings
//! - One `PermissionSet` type for module/action matrices and page toggles
//! - Fail-closed permission checks with a privileged super admin bypass
//! - A page gate with a configurable policy for unmapped pages
//! - Configurable enforcement modes (off/advisory/strict)

mod catalog;
mod evaluator;
mod page_gate;
mod permission_set;
mod principal;

pub use catalog::{Action, Catalog, Granularity, ModuleDef, PageDef, PageRequirement, PanelType};
pub use evaluator::{has_permission, DefaultPolicyEvaluator, PolicyEvaluator};
pub use page_gate::{PageDecision, PageGate, UnmappedPagePolicy};
pub use permission_set::{PageAccess, PermissionError, PermissionSet};
pub use principal::Principal;

use std::str::FromStr;

/// Authorization enforcement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthzMode {
    /// No permission checks (development mode)
    Off,
    /// Log denials but allow requests (testing mode)
    Advisory,
    /// Enforce 403 on denied requests (production mode)
    #[default]
    Strict,
}

impl FromStr for AuthzMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(AuthzMode::Off),
            "advisory" => Ok(AuthzMode::Advisory),
            "strict" => Ok(AuthzMode::Strict),
            other => Err(format!("invalid authz mode: {}", other)),
        }
    }
}

/// Well-known role keys
pub mod roles {
    pub const SUPER_ADMIN: &str = "super_admin";
    pub const HOTEL_MANAGER: &str = "hotel_manager";
}
