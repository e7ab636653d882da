use std::str::FromStr;

use serde::Serialize;
use utoipa::ToSchema;

use super::catalog::Catalog;
use super::evaluator::PolicyEvaluator;
use super::principal::Principal;

/// What to answer for a page id that has no entry in the panel's page table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedPagePolicy {
    #[default]
    Deny,
    /// Legacy behaviour: any authenticated user may open an unmapped page.
    Allow,
}

impl FromStr for UnmappedPagePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deny" => Ok(UnmappedPagePolicy::Deny),
            "allow" => Ok(UnmappedPagePolicy::Allow),
            other => Err(format!("invalid unmapped page policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageDecision {
    pub page_id: String,
    pub mapped: bool,
    pub allowed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageGate {
    policy: UnmappedPagePolicy,
}

impl PageGate {
    pub fn new(policy: UnmappedPagePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnmappedPagePolicy {
        self.policy
    }

    pub async fn decide(
        &self,
        evaluator: &dyn PolicyEvaluator,
        principal: Option<&Principal>,
        page_id: &str,
    ) -> PageDecision {
        let Some(principal) = principal else {
            return PageDecision {
                page_id: page_id.to_string(),
                mapped: false,
                allowed: false,
            };
        };

        let catalog = Catalog::for_panel(principal.panel);
        let (mapped, allowed) = match catalog.page(page_id) {
            Some(page) => (
                true,
                evaluator
                    .can(principal, page.requires.module, page.requires.action)
                    .await,
            ),
            None => {
                tracing::debug!(page_id = %page_id, panel = %principal.panel, policy = ?self.policy, "unmapped page");
                (false, self.policy == UnmappedPagePolicy::Allow)
            }
        };

        PageDecision {
            page_id: page_id.to_string(),
            mapped,
            allowed,
        }
    }

    pub async fn can_access_page(
        &self,
        evaluator: &dyn PolicyEvaluator,
        principal: Option<&Principal>,
        page_id: &str,
    ) -> bool {
        self.decide(evaluator, principal, page_id).await.allowed
    }

    /// Every page of the principal's panel with its allowed flag, in
    /// navigation order.
    pub async fn accessible_pages(&self, evaluator: &dyn PolicyEvaluator, principal: &Principal) -> Vec<PageDecision> {
        let catalog = Catalog::for_panel(principal.panel);
        let mut decisions = Vec::with_capacity(catalog.pages.len());
        for page in catalog.pages {
            decisions.push(self.decide(evaluator, Some(principal), page.id).await);
        }
        decisions
    }
}
