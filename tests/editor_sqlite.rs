mod common;

use std::time::Duration;

use anyhow::Result;

use kiosk_console::authz::{Action, PanelType, PermissionSet};
use kiosk_console::db::users::{self, NewUser};
use kiosk_console::editor::{EditorState, RoleEditor};
use kiosk_console::errors::AppError;
use kiosk_console::models::rbac::RoleCreateRequest;
use kiosk_console::store::{RoleStore, SqliteRoleStore};
use kiosk_console::utils::hash_password;

const TIMEOUT: Duration = Duration::from_secs(5);

fn request(name: &str, scope: PanelType, permissions: PermissionSet) -> RoleCreateRequest {
    RoleCreateRequest {
        name: name.to_string(),
        description: None,
        scope,
        permissions,
    }
}

#[tokio::test]
async fn editor_saves_through_the_sqlite_store() -> Result<()> {
    let t = common::spawn_app().await?;
    let store = SqliteRoleStore::new(t.pool.clone());
    let role = store.create(&request("Fleet Tech", PanelType::Admin, PermissionSet::new())).await?;
    assert_eq!(role.version, 1);

    let mut editor = RoleEditor::new(role.clone());
    assert!(editor.toggle("fleet", Action::Edit)?);
    assert_eq!(editor.state(), EditorState::Dirty);

    let saved = editor.save(&store, TIMEOUT).await?;
    assert_eq!(saved.version, 2);
    assert_eq!(editor.state(), EditorState::Clean);
    assert!(saved.permissions.allows("fleet", Action::View));

    let reloaded = store.get_by_key("fleet_tech").await?;
    assert_eq!(reloaded.permissions, saved.permissions);
    assert_eq!(reloaded.version, 2);

    Ok(())
}

#[tokio::test]
async fn second_editor_on_old_version_goes_stale() -> Result<()> {
    let t = common::spawn_app().await?;
    let store = SqliteRoleStore::new(t.pool.clone());
    let role = store.create(&request("Finance Clerk", PanelType::Admin, PermissionSet::new())).await?;

    let mut first = RoleEditor::new(role.clone());
    let mut second = RoleEditor::new(role);

    first.toggle("finance", Action::View)?;
    second.toggle("finance", Action::Export)?;

    first.save(&store, TIMEOUT).await?;
    let err = second.save(&store, TIMEOUT).await.err();
    assert!(matches!(err, Some(AppError::StaleVersion { expected: 1, current: 2 })));

    // the losing editor keeps its edits for a retry
    assert_eq!(second.state(), EditorState::Dirty);
    assert!(second.draft().allows("finance", Action::Export));
    assert!(second.last_error().is_some());

    let latest = store.get(second.role().id).await?;
    second.load(latest);
    assert_eq!(second.state(), EditorState::Clean);
    assert!(!second.draft().allows("finance", Action::Export));

    Ok(())
}

#[tokio::test]
async fn hotel_pages_toggle_as_a_whole() -> Result<()> {
    let t = common::spawn_app().await?;
    let store = SqliteRoleStore::new(t.pool.clone());
    let role = store.create(&request("Front Desk", PanelType::Hotel, PermissionSet::new())).await?;

    let mut editor = RoleEditor::new(role);
    editor.set_page_enabled("guests", true)?;
    editor.set_page_enabled("billing", true)?;
    editor.set_page_enabled("billing", false)?;
    let saved = editor.save(&store, TIMEOUT).await?;

    let enabled: Vec<String> = saved
        .permissions
        .page_access(saved.catalog())
        .into_iter()
        .filter(|p| p.enabled)
        .map(|p| p.id)
        .collect();
    assert_eq!(enabled, vec!["guests".to_string()]);

    assert!(matches!(editor.set_page_enabled("invoices", true), Err(AppError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn unknown_key_is_not_found() -> Result<()> {
    let t = common::spawn_app().await?;
    let store = SqliteRoleStore::new(t.pool.clone());

    assert!(matches!(store.get_by_key("night_owl").await, Err(AppError::NotFound(_))));
    assert!(matches!(store.get(uuid::Uuid::new_v4()).await, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn user_count_tracks_active_holders_and_blocks_delete() -> Result<()> {
    let t = common::spawn_app().await?;
    let store = SqliteRoleStore::new(t.pool.clone());
    let role = store
        .create(&request(
            "Support Agent",
            PanelType::Admin,
            PermissionSet::from_grants([("support", &[Action::View][..])]),
        ))
        .await?;

    let user = users::insert_user(
        &t.pool,
        NewUser {
            email: "agent@example.com".into(),
            full_name: "Agent".into(),
            password_hash: hash_password("password-123")?,
            role_id: role.id,
            panel_type: PanelType::Admin,
            hotel_id: None,
        },
    )
    .await?;

    assert_eq!(store.get(role.id).await?.user_count, 1);
    assert!(matches!(store.delete(role.id).await, Err(AppError::Conflict(_))));

    // deactivated holders drop out of the count but still pin the role
    users::deactivate(&t.pool, user.id).await?;
    assert_eq!(store.get(role.id).await?.user_count, 0);
    assert!(matches!(store.delete(role.id).await, Err(AppError::Conflict(_))));

    let spare = store.create(&request("Spare", PanelType::Admin, PermissionSet::new())).await?;
    let removed = store.delete(spare.id).await?;
    assert_eq!(removed.key, "spare");
    assert!(matches!(store.get(spare.id).await, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn same_name_is_allowed_across_panels_but_key_is_global() -> Result<()> {
    let t = common::spawn_app().await?;
    let store = SqliteRoleStore::new(t.pool.clone());

    store.create(&request("Supervisor", PanelType::Admin, PermissionSet::new())).await?;
    let err = store
        .create(&request("Supervisor", PanelType::Hotel, PermissionSet::new()))
        .await
        .err();
    assert!(matches!(err, Some(AppError::Conflict(ref m)) if m.contains("key 'supervisor'")));

    let listed = store.list(Some(PanelType::Admin)).await?;
    assert!(listed.iter().any(|r| r.key == "supervisor"));
    assert!(listed.iter().all(|r| r.scope == PanelType::Admin));

    Ok(())
}

#[tokio::test]
async fn conflict_message_names_the_cause() -> Result<()> {
    let t = common::spawn_app().await?;
    let store = SqliteRoleStore::new(t.pool.clone());
    store.create(&request("Ops Lead", PanelType::Admin, PermissionSet::new())).await?;

    // same name in the same panel
    match store.create(&request("Ops Lead", PanelType::Admin, PermissionSet::new())).await {
        Err(AppError::Conflict(message)) => assert_eq!(message, "a role named 'Ops Lead' already exists"),
        other => panic!("expected conflict, got {:?}", other),
    }

    // different name, same slug
    match store.create(&request("Ops-Lead", PanelType::Admin, PermissionSet::new())).await {
        Err(AppError::Conflict(message)) => {
            assert_eq!(message, "role key 'ops_lead' is already taken by role 'Ops Lead'")
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn non_ascii_names_get_a_key() -> Result<()> {
    let t = common::spawn_app().await?;
    let store = SqliteRoleStore::new(t.pool.clone());

    let role = store.create(&request("監査", PanelType::Admin, PermissionSet::new())).await?;
    assert_eq!(role.key, "監査");
    assert_eq!(store.get_by_key("監査").await?.id, role.id);

    Ok(())
}
