//! Edit session for one role's permission matrix.
//!
//! Edits live in memory until saved. Each save carries a [`SaveTicket`]; a
//! completion is applied only while its ticket's generation is current, so a
//! response that arrives after `load` or `discard` cannot clobber the editor.

use std::time::Duration;

use serde::Serialize;

use crate::authz::{Action, PermissionSet};
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{Role, RoleUpdateRequest};
use crate::store::{with_timeout, RoleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorState {
    Clean,
    Dirty,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    generation: u64,
    base_version: i64,
}

impl SaveTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn base_version(&self) -> i64 {
        self.base_version
    }
}

#[derive(Debug, Clone)]
pub struct RoleEditor {
    saved: Role,
    draft: PermissionSet,
    state: EditorState,
    generation: u64,
    last_error: Option<String>,
}

impl RoleEditor {
    pub fn new(role: Role) -> Self {
        Self {
            draft: role.permissions.clone(),
            saved: role,
            state: EditorState::Clean,
            generation: 0,
            last_error: None,
        }
    }

    /// Replaces the base role, dropping edits and any in-flight save.
    pub fn load(&mut self, role: Role) {
        self.draft = role.permissions.clone();
        self.saved = role;
        self.state = EditorState::Clean;
        self.generation += 1;
        self.last_error = None;
    }

    pub fn role(&self) -> &Role {
        &self.saved
    }

    pub fn draft(&self) -> &PermissionSet {
        &self.draft
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.draft != self.saved.permissions
    }

    /// Flips one cell of the draft with the cascade rules applied.
    pub fn toggle(&mut self, module: &str, action: Action) -> AppResult<bool> {
        self.ensure_editable()?;
        let granted = self.draft.toggle(self.saved.catalog(), module, action)?;
        self.refresh_state();
        Ok(granted)
    }

    /// Hotel-panel shortcut: enables or disables a page as a whole.
    pub fn set_page_enabled(&mut self, page: &str, enabled: bool) -> AppResult<()> {
        self.ensure_editable()?;
        self.draft.set_page_enabled(self.saved.catalog(), page, enabled)?;
        self.refresh_state();
        Ok(())
    }

    /// Drops in-memory edits and restores the last saved permissions.
    pub fn discard(&mut self) {
        self.draft = self.saved.permissions.clone();
        self.state = EditorState::Clean;
        self.generation += 1;
        self.last_error = None;
    }

    pub fn begin_save(&mut self) -> AppResult<SaveTicket> {
        match self.state {
            EditorState::Dirty => {
                self.state = EditorState::Saving;
                Ok(SaveTicket {
                    generation: self.generation,
                    base_version: self.saved.version,
                })
            }
            EditorState::Saving => Err(AppError::conflict("a save is already in progress")),
            EditorState::Clean => Err(AppError::validation("there are no changes to save")),
        }
    }

    /// The update the store should apply for `ticket`.
    pub fn patch(&self, ticket: &SaveTicket) -> RoleUpdateRequest {
        RoleUpdateRequest {
            permissions: Some(self.draft.clone()),
            expected_version: ticket.base_version,
            ..Default::default()
        }
    }

    /// Applies a save outcome. Returns `false` when the ticket was superseded
    /// and the outcome ignored.
    pub fn complete_save(&mut self, ticket: SaveTicket, outcome: &AppResult<Role>) -> bool {
        if ticket.generation != self.generation || self.state != EditorState::Saving {
            tracing::debug!(
                role_id = %self.saved.id,
                ticket_generation = ticket.generation,
                generation = self.generation,
                "ignoring stale save completion"
            );
            return false;
        }

        match outcome {
            Ok(role) => {
                self.saved = role.clone();
                self.draft = role.permissions.clone();
                self.state = EditorState::Clean;
                self.last_error = None;
            }
            Err(err) => {
                self.state = EditorState::Dirty;
                self.last_error = Some(err.public_message());
            }
        }
        true
    }

    /// One full save round trip, bounded by `timeout`. On failure the editor
    /// stays dirty with its edits intact.
    pub async fn save(&mut self, store: &dyn RoleStore, timeout: Duration) -> AppResult<Role> {
        let ticket = self.begin_save()?;
        let patch = self.patch(&ticket);
        let outcome = with_timeout(timeout, store.update(self.saved.id, &patch)).await;
        self.complete_save(ticket, &outcome);
        outcome
    }

    fn ensure_editable(&self) -> AppResult<()> {
        if self.state == EditorState::Saving {
            return Err(AppError::conflict("permissions cannot change while a save is in progress"));
        }
        Ok(())
    }

    fn refresh_state(&mut self) {
        self.state = if self.has_unsaved_changes() {
            EditorState::Dirty
        } else {
            EditorState::Clean
        };
    }
}
