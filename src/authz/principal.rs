use uuid::Uuid;

use super::catalog::PanelType;
use super::permission_set::PermissionSet;

/// Principal represents the authenticated session with its resolved role
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub panel: PanelType,
    pub hotel_id: Option<Uuid>,
    pub role_id: Uuid,
    pub role_key: String,
    pub is_system_role: bool,
    pub permissions: PermissionSet,
}

impl Principal {
    pub fn new(user_id: Uuid, panel: PanelType) -> Self {
        Self {
            user_id,
            session_id: Uuid::nil(),
            panel,
            hotel_id: None,
            role_id: Uuid::nil(),
            role_key: String::new(),
            is_system_role: false,
            permissions: PermissionSet::new(),
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_role(mut self, role_id: Uuid, role_key: impl Into<String>, is_system_role: bool) -> Self {
        self.role_id = role_id;
        self.role_key = role_key.into();
        self.is_system_role = is_system_role;
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_hotel(mut self, hotel_id: Option<Uuid>) -> Self {
        self.hotel_id = hotel_id;
        self
    }

    pub fn has_role(&self, role_key: &str) -> bool {
        self.role_key == role_key
    }

    /// Privileged: only the seeded system role on the admin panel qualifies.
    pub fn is_super_admin(&self) -> bool {
        self.panel == PanelType::Admin && self.is_system_role && self.has_role(super::roles::SUPER_ADMIN)
    }
}
