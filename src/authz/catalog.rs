use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An operation a role may be granted on a module.
///
/// `create` is the canonical spelling. Older clients send `add` for the same
/// action, so it is accepted on input and never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    #[serde(alias = "add")]
    Create,
    Edit,
    Delete,
    Export,
}

impl Action {
    pub const ALL: [Action; 5] = [Action::View, Action::Create, Action::Edit, Action::Delete, Action::Export];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Export => "export",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseActionError(pub String);

impl fmt::Display for ParseActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid action: {}", self.0)
    }
}

impl std::error::Error for ParseActionError {}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Action::View),
            "create" | "add" => Ok(Action::Create),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            "export" => Ok(Action::Export),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

/// Which console a user or role belongs to. Also selects the permission
/// granularity: the admin panel grants actions per module, the hotel panel
/// grants whole pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PanelType {
    Admin,
    Hotel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Action,
    Page,
}

impl PanelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelType::Admin => "admin",
            PanelType::Hotel => "hotel",
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            PanelType::Admin => Granularity::Action,
            PanelType::Hotel => Granularity::Page,
        }
    }
}

impl fmt::Display for PanelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePanelTypeError(pub String);

impl fmt::Display for ParsePanelTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid panel type: {}", self.0)
    }
}

impl std::error::Error for ParsePanelTypeError {}

impl FromStr for PanelType {
    type Err = ParsePanelTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(PanelType::Admin),
            "hotel" => Ok(PanelType::Hotel),
            _ => Err(ParsePanelTypeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub actions: &'static [Action],
}

impl ModuleDef {
    pub fn declares(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageRequirement {
    pub module: &'static str,
    pub action: Action,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub requires: PageRequirement,
}

#[derive(Debug, Serialize)]
pub struct Catalog {
    pub panel: PanelType,
    pub modules: &'static [ModuleDef],
    pub pages: &'static [PageDef],
}

impl Catalog {
    pub fn for_panel(panel: PanelType) -> &'static Catalog {
        match panel {
            PanelType::Admin => &ADMIN_CATALOG,
            PanelType::Hotel => &HOTEL_CATALOG,
        }
    }

    pub fn module(&self, id: &str) -> Option<&'static ModuleDef> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub fn page(&self, id: &str) -> Option<&'static PageDef> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn is_declared(&self, module: &str, action: Action) -> bool {
        self.module(module).map(|m| m.declares(action)).unwrap_or(false)
    }
}

use Action::{Create, Delete, Edit, Export, View};

const ALL_ACTIONS: &[Action] = &[View, Create, Edit, Delete, Export];
const VIEW_ONLY: &[Action] = &[View];

const ADMIN_MODULES: &[ModuleDef] = &[
    ModuleDef { id: "dashboard", name: "Dashboard", description: "Fleet-wide overview", actions: VIEW_ONLY },
    ModuleDef { id: "hotels", name: "Hotels", description: "Hotel registry", actions: ALL_ACTIONS },
    ModuleDef { id: "fleet", name: "Kiosk Fleet", description: "Kiosk monitoring and provisioning", actions: &[View, Create, Edit, Delete] },
    ModuleDef { id: "finance", name: "Finance", description: "Billing and invoicing", actions: &[View, Create, Edit, Export] },
    ModuleDef { id: "support", name: "Support", description: "Support tickets", actions: ALL_ACTIONS },
    ModuleDef { id: "users", name: "Users", description: "Console user accounts", actions: ALL_ACTIONS },
    ModuleDef { id: "roles", name: "Roles", description: "Roles and permissions", actions: ALL_ACTIONS },
    ModuleDef { id: "audit", name: "Audit Logs", description: "Change history", actions: &[View, Export] },
    ModuleDef { id: "settings", name: "Settings", description: "Platform settings", actions: &[View, Edit] },
];

const fn page(id: &'static str, name: &'static str, description: &'static str, module: &'static str, action: Action) -> PageDef {
    PageDef { id, name, description, requires: PageRequirement { module, action } }
}

const ADMIN_PAGES: &[PageDef] = &[
    page("dashboard", "Dashboard", "Fleet-wide overview", "dashboard", View),
    page("hotels", "Hotels", "Hotel list", "hotels", View),
    page("hotels.new", "Add Hotel", "Onboard a hotel", "hotels", Create),
    page("fleet", "Kiosk Fleet", "Kiosk status board", "fleet", View),
    page("finance", "Finance", "Revenue overview", "finance", View),
    page("invoices", "Invoices", "Invoice list", "finance", View),
    page("support", "Support", "Ticket queue", "support", View),
    page("users", "Users", "Console users", "users", View),
    page("roles", "Roles", "Role matrix", "roles", View),
    page("audit-logs", "Audit Logs", "Change history", "audit", View),
    page("settings", "Settings", "Platform settings", "settings", View),
];

const HOTEL_MODULES: &[ModuleDef] = &[
    ModuleDef { id: "dashboard", name: "Dashboard", description: "Hotel overview", actions: VIEW_ONLY },
    ModuleDef { id: "kiosks", name: "Kiosks", description: "Kiosks installed at the hotel", actions: VIEW_ONLY },
    ModuleDef { id: "guests", name: "Guests", description: "Check-ins and guest sessions", actions: VIEW_ONLY },
    ModuleDef { id: "billing", name: "Billing", description: "Invoices issued to the hotel", actions: VIEW_ONLY },
    ModuleDef { id: "support", name: "Support", description: "Hotel support tickets", actions: VIEW_ONLY },
    ModuleDef { id: "reports", name: "Reports", description: "Usage reports", actions: VIEW_ONLY },
    ModuleDef { id: "staff", name: "Staff", description: "Hotel staff accounts", actions: VIEW_ONLY },
    ModuleDef { id: "settings", name: "Settings", description: "Hotel settings", actions: VIEW_ONLY },
];

const HOTEL_PAGES: &[PageDef] = &[
    page("dashboard", "Dashboard", "Hotel overview", "dashboard", View),
    page("kiosks", "Kiosks", "Kiosks installed at the hotel", "kiosks", View),
    page("guests", "Guests", "Check-ins and guest sessions", "guests", View),
    page("billing", "Billing", "Invoices issued to the hotel", "billing", View),
    page("support", "Support", "Hotel support tickets", "support", View),
    page("reports", "Reports", "Usage reports", "reports", View),
    page("staff", "Staff", "Hotel staff accounts", "staff", View),
    page("settings", "Settings", "Hotel settings", "settings", View),
];

static ADMIN_CATALOG: Catalog = Catalog { panel: PanelType::Admin, modules: ADMIN_MODULES, pages: ADMIN_PAGES };
static HOTEL_CATALOG: Catalog = Catalog { panel: PanelType::Hotel, modules: HOTEL_MODULES, pages: HOTEL_PAGES };
