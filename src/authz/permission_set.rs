use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::catalog::{Action, Catalog, Granularity};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("unknown module '{0}'")]
    UnknownModule(String),
    #[error("unknown page '{0}'")]
    UnknownPage(String),
    #[error("action '{action}' is not applicable to module '{module}'")]
    UndeclaredAction { module: String, action: Action },
}

/// Grants held by a role, keyed by module id.
///
/// Admin roles use it as a module/action matrix. Hotel roles use it as a page
/// allow-list where a page is enabled when its module holds `view`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<String, BTreeSet<Action>>);

/// Flat page toggle as shown in the hotel panel's role editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageAccess {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every declared action of every module in the catalog.
    pub fn full(catalog: &Catalog) -> Self {
        let grants = catalog
            .modules
            .iter()
            .map(|m| (m.id.to_string(), m.actions.iter().copied().collect()))
            .collect();
        Self(grants)
    }

    pub fn from_grants<'a>(grants: impl IntoIterator<Item = (&'a str, &'a [Action])>) -> Self {
        let mut set = Self::new();
        for (module, actions) in grants {
            for action in actions {
                set.grant(module, *action);
            }
        }
        set
    }

    pub fn allows(&self, module: &str, action: Action) -> bool {
        self.0.get(module).map(|actions| actions.contains(&action)).unwrap_or(false)
    }

    pub fn actions(&self, module: &str) -> Option<&BTreeSet<Action>> {
        self.0.get(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = (&str, &BTreeSet<Action>)> {
        self.0.iter().map(|(m, a)| (m.as_str(), a))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw grant, no catalog check and no cascade.
    pub fn grant(&mut self, module: &str, action: Action) {
        self.0.entry(module.to_string()).or_default().insert(action);
    }

    /// Raw revoke, no cascade. Drops the module once it holds nothing.
    pub fn revoke(&mut self, module: &str, action: Action) {
        if let Some(actions) = self.0.get_mut(module) {
            actions.remove(&action);
            if actions.is_empty() {
                self.0.remove(module);
            }
        }
    }

    pub fn validate(&self, catalog: &Catalog) -> Result<(), PermissionError> {
        for (module, actions) in &self.0 {
            let def = catalog
                .module(module)
                .ok_or_else(|| PermissionError::UnknownModule(module.clone()))?;
            if let Some(action) = actions.iter().find(|a| !def.declares(**a)) {
                return Err(PermissionError::UndeclaredAction {
                    module: module.clone(),
                    action: *action,
                });
            }
        }
        Ok(())
    }

    /// Any non-view grant implies view; empty entries are dropped.
    pub fn normalized(mut self) -> Self {
        self.0.retain(|_, actions| !actions.is_empty());
        for actions in self.0.values_mut() {
            actions.insert(Action::View);
        }
        self
    }

    /// Flips one cell and applies the cascade rules. Returns whether the
    /// action is granted afterwards.
    ///
    /// Revoking `view` clears the module. Granting anything else grants `view`.
    pub fn toggle(&mut self, catalog: &Catalog, module: &str, action: Action) -> Result<bool, PermissionError> {
        let def = catalog
            .module(module)
            .ok_or_else(|| PermissionError::UnknownModule(module.to_string()))?;
        if !def.declares(action) {
            return Err(PermissionError::UndeclaredAction {
                module: module.to_string(),
                action,
            });
        }

        if self.allows(module, action) {
            if action == Action::View {
                self.0.remove(module);
            } else {
                self.revoke(module, action);
            }
            Ok(false)
        } else {
            self.grant(module, action);
            if action != Action::View {
                self.grant(module, Action::View);
            }
            Ok(true)
        }
    }

    pub fn set_page_enabled(&mut self, catalog: &Catalog, page: &str, enabled: bool) -> Result<(), PermissionError> {
        let def = catalog
            .page(page)
            .ok_or_else(|| PermissionError::UnknownPage(page.to_string()))?;
        let module = def.requires.module;
        if self.allows(module, Action::View) != enabled {
            self.toggle(catalog, module, Action::View)?;
        }
        Ok(())
    }

    /// The hotel-panel view of this set. Empty for action-granular catalogs.
    pub fn page_access(&self, catalog: &Catalog) -> Vec<PageAccess> {
        if catalog.panel.granularity() != Granularity::Page {
            return Vec::new();
        }

        catalog
            .pages
            .iter()
            .map(|page| PageAccess {
                id: page.id.to_string(),
                name: page.name.to_string(),
                description: page.description.to_string(),
                enabled: self.allows(page.requires.module, page.requires.action),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::catalog::PanelType;

    fn admin() -> &'static Catalog {
        Catalog::for_panel(PanelType::Admin)
    }

    #[test]
    fn test_absent_module_denies_every_action() {
        let set = PermissionSet::from_grants([("hotels", &[Action::View][..])]);
        for action in Action::ALL {
            assert!(!set.allows("finance", action));
        }
        assert!(set.allows("hotels", Action::View));
    }

    #[test]
    fn test_view_off_clears_module() {
        let mut set = PermissionSet::from_grants([("hotels", &[Action::View, Action::Edit, Action::Export][..])]);
        let granted = set.toggle(admin(), "hotels", Action::View).unwrap();
        assert!(!granted);
        assert!(set.actions("hotels").is_none());
        assert!(!set.allows("hotels", Action::Edit));
    }

    #[test]
    fn test_non_view_on_grants_view() {
        let mut set = PermissionSet::new();
        assert!(set.toggle(admin(), "support", Action::Delete).unwrap());
        assert!(set.allows("support", Action::View));
        assert!(set.allows("support", Action::Delete));

        assert!(!set.toggle(admin(), "support", Action::Delete).unwrap());
        assert!(set.allows("support", Action::View));
    }

    #[test]
    fn test_undeclared_action_is_rejected() {
        let mut set = PermissionSet::new();
        let err = set.toggle(admin(), "fleet", Action::Export).unwrap_err();
        assert_eq!(
            err,
            PermissionError::UndeclaredAction { module: "fleet".into(), action: Action::Export }
        );
        assert!(set.is_empty());

        let bad = PermissionSet::from_grants([("finance", &[Action::View, Action::Delete][..])]);
        assert!(bad.validate(admin()).is_err());
        let unknown = PermissionSet::from_grants([("kiosks", &[Action::View][..])]);
        assert_eq!(unknown.validate(admin()), Err(PermissionError::UnknownModule("kiosks".into())));
    }

    #[test]
    fn test_normalized_adds_implied_view() {
        let set = PermissionSet::from_grants([("users", &[Action::Edit][..])]).normalized();
        assert!(set.allows("users", Action::View));
    }

    #[test]
    fn test_add_alias_deserializes() {
        let set: PermissionSet = serde_json::from_str(r#"{"hotels":["view","add"]}"#).unwrap();
        assert!(set.allows("hotels", Action::Create));
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"{"hotels":["view","create"]}"#);
    }

    #[test]
    fn test_page_toggles_for_hotel_panel() {
        let catalog = Catalog::for_panel(PanelType::Hotel);
        let mut set = PermissionSet::new();
        set.set_page_enabled(catalog, "kiosks", true).unwrap();
        set.set_page_enabled(catalog, "billing", true).unwrap();
        set.set_page_enabled(catalog, "billing", false).unwrap();

        let pages = set.page_access(catalog);
        assert_eq!(pages.len(), catalog.pages.len());
        let enabled: Vec<&str> = pages.iter().filter(|p| p.enabled).map(|p| p.id.as_str()).collect();
        assert_eq!(enabled, vec!["kiosks"]);

        assert!(set.set_page_enabled(catalog, "finance", true).is_err());
        assert!(set.page_access(admin()).is_empty());
    }

    #[test]
    fn test_unknown_page_is_named_as_a_page() {
        let catalog = Catalog::for_panel(PanelType::Hotel);
        let mut set = PermissionSet::new();
        let err = set.set_page_enabled(catalog, "spa", true).unwrap_err();
        assert_eq!(err, PermissionError::UnknownPage("spa".into()));
        assert_eq!(err.to_string(), "unknown page 'spa'");
    }
}
