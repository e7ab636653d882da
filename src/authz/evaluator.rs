use async_trait::async_trait;

use super::catalog::{Action, Catalog};
use super::permission_set::PermissionSet;
use super::principal::Principal;

/// Fail-closed lookup: a module missing from the set grants nothing.
pub fn has_permission(permissions: &PermissionSet, module: &str, action: Action) -> bool {
    permissions.allows(module, action)
}

/// Policy evaluator trait for pluggable authorization logic
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Check if the principal may perform `action` on `module`
    async fn can(&self, principal: &Principal, module: &str, action: Action) -> bool;
}

/// Default policy evaluator with standard RBAC logic
///
/// Evaluation order:
/// 1. super_admin system role -> allow (privileged bypass, not data-driven)
/// 2. module/action not declared by the principal's panel catalog -> deny
/// 3. role permission matrix -> allow
/// 4. deny
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicyEvaluator;

impl DefaultPolicyEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PolicyEvaluator for DefaultPolicyEvaluator {
    async fn can(&self, principal: &Principal, module: &str, action: Action) -> bool {
        // 1. Super admin bypasses all checks
        if principal.is_super_admin() {
            tracing::debug!(
                user_id = %principal.user_id,
                module = %module,
                action = %action,
                "super_admin bypass"
            );
            return true;
        }

        // 2. Grants outside the principal's own catalog count for nothing
        if !Catalog::for_panel(principal.panel).is_declared(module, action) {
            tracing::debug!(
                user_id = %principal.user_id,
                panel = %principal.panel,
                module = %module,
                action = %action,
                "not declared for panel"
            );
            return false;
        }

        // 3. Role permissions
        if has_permission(&principal.permissions, module, action) {
            tracing::debug!(
                user_id = %principal.user_id,
                role = %principal.role_key,
                module = %module,
                action = %action,
                "role permission match"
            );
            return true;
        }

        // 4. Deny
        tracing::debug!(
            user_id = %principal.user_id,
            role = %principal.role_key,
            module = %module,
            action = %action,
            "permission denied"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::catalog::PanelType;
    use crate::authz::roles;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_super_admin_bypasses_all() {
        let evaluator = DefaultPolicyEvaluator::new();
        let principal = Principal::new(Uuid::new_v4(), PanelType::Admin)
            .with_role(Uuid::new_v4(), roles::SUPER_ADMIN, true);

        assert!(evaluator.can(&principal, "anything", Action::Delete).await);
    }

    #[tokio::test]
    async fn test_super_admin_key_without_system_flag_gets_no_bypass() {
        let evaluator = DefaultPolicyEvaluator::new();
        let principal = Principal::new(Uuid::new_v4(), PanelType::Admin)
            .with_role(Uuid::new_v4(), roles::SUPER_ADMIN, false);

        assert!(!evaluator.can(&principal, "hotels", Action::View).await);
    }

    #[tokio::test]
    async fn test_role_permission_allows() {
        let evaluator = DefaultPolicyEvaluator::new();
        let principal = Principal::new(Uuid::new_v4(), PanelType::Admin)
            .with_role(Uuid::new_v4(), "auditor", false)
            .with_permissions(PermissionSet::from_grants([("audit", &[Action::View][..])]));

        assert!(evaluator.can(&principal, "audit", Action::View).await);
        assert!(!evaluator.can(&principal, "audit", Action::Export).await);
    }

    #[tokio::test]
    async fn test_grants_outside_panel_catalog_are_ignored() {
        let evaluator = DefaultPolicyEvaluator::new();
        let principal = Principal::new(Uuid::new_v4(), PanelType::Hotel)
            .with_role(Uuid::new_v4(), "front_desk", false)
            .with_permissions(PermissionSet::from_grants([
                ("support", &[Action::View, Action::Export][..]),
                ("users", &[Action::View][..]),
            ]));

        assert!(evaluator.can(&principal, "support", Action::View).await);
        // hotel pages are view-only, and `users` is an admin module
        assert!(!evaluator.can(&principal, "support", Action::Export).await);
        assert!(!evaluator.can(&principal, "users", Action::View).await);
    }

    #[tokio::test]
    async fn test_denial_when_module_absent() {
        let evaluator = DefaultPolicyEvaluator::new();
        let principal = Principal::new(Uuid::new_v4(), PanelType::Admin);

        for action in Action::ALL {
            assert!(!evaluator.can(&principal, "finance", action).await);
        }
    }
}
