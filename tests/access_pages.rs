mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::PASSWORD;
use kiosk_console::authz::UnmappedPagePolicy;

#[tokio::test]
async fn page_check_without_session_is_denied() -> Result<()> {
    let t = common::spawn_app().await?;

    for page in ["dashboard", "audit-logs", "never-heard-of-it"] {
        let (status, v) = t.send("GET", &format!("/access/pages/{}", page), None, None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["allowed"], false, "page {}", page);
    }

    // an invalid token is treated like no session
    let (status, v) = t.send("GET", "/access/pages/dashboard", Some("bogus"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["allowed"], false);

    Ok(())
}

#[tokio::test]
async fn unmapped_page_is_denied_by_default() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin_token().await?;

    let (_, v) = t.send("GET", "/access/pages/reports.legacy", Some(&admin), None).await?;
    assert_eq!(v["data"]["mapped"], false);
    assert_eq!(v["data"]["allowed"], false);

    Ok(())
}

#[tokio::test]
async fn allow_policy_opens_unmapped_pages_only() -> Result<()> {
    let t = common::spawn_app_with(|c| c.with_unmapped_pages(UnmappedPagePolicy::Allow)).await?;
    let admin = t.admin_token().await?;
    let role = t.create_role(&admin, "Support Agent", "admin", json!({ "support": ["view"] })).await?;
    t.invite(&admin, "agent@example.com", role["id"].as_str().unwrap_or_default(), None).await?;
    let token = t.login("agent@example.com", PASSWORD).await?;

    let (_, v) = t.send("GET", "/access/pages/reports.legacy", Some(&token), None).await?;
    assert_eq!(v["data"]["mapped"], false);
    assert_eq!(v["data"]["allowed"], true);

    let (_, v) = t.send("GET", "/access/pages/finance", Some(&token), None).await?;
    assert_eq!(v["data"]["mapped"], true);
    assert_eq!(v["data"]["allowed"], false);

    Ok(())
}

#[tokio::test]
async fn create_page_needs_create_permission() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin_token().await?;
    let role = t.create_role(&admin, "Hotel Viewer", "admin", json!({ "hotels": ["view"] })).await?;
    t.invite(&admin, "viewer@example.com", role["id"].as_str().unwrap_or_default(), None).await?;
    let token = t.login("viewer@example.com", PASSWORD).await?;

    let (_, v) = t.send("GET", "/access/pages/hotels", Some(&token), None).await?;
    assert_eq!(v["data"]["allowed"], true);
    let (_, v) = t.send("GET", "/access/pages/hotels.new", Some(&token), None).await?;
    assert_eq!(v["data"]["allowed"], false);

    Ok(())
}

#[tokio::test]
async fn hotel_user_navigation_follows_page_toggles() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin_token().await?;
    let hotel = t.create_hotel(&admin, "Harbour View").await?;
    let role = t.create_role(&admin, "Front Desk", "hotel", json!({ "guests": ["view"] })).await?;
    t.invite(&admin, "desk@example.com", role["id"].as_str().unwrap_or_default(), hotel["id"].as_str())
        .await?;
    let token = t.login("desk@example.com", PASSWORD).await?;

    let (status, v) = t.send("GET", "/access/pages", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let pages = v["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(pages.len(), 8);
    let allowed: Vec<&str> = pages
        .iter()
        .filter(|p| p["allowed"] == true)
        .filter_map(|p| p["page_id"].as_str())
        .collect();
    assert_eq!(allowed, vec!["guests"]);

    // admin-only pages do not exist in the hotel panel
    let (_, v) = t.send("GET", "/access/pages/finance", Some(&token), None).await?;
    assert_eq!(v["data"]["mapped"], false);
    assert_eq!(v["data"]["allowed"], false);

    // and neither do admin endpoints
    let (status, _) = t.send("GET", "/roles", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn hotel_manager_is_not_a_super_admin() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin_token().await?;
    let hotel = t.create_hotel(&admin, "Harbour View").await?;
    let manager = t.role_id("hotel_manager").await?;
    t.invite(&admin, "gm@example.com", &manager, hotel["id"].as_str()).await?;
    let token = t.login("gm@example.com", PASSWORD).await?;

    let (_, me) = t.send("GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(me["data"]["is_super_admin"], false);
    let pages = me["data"]["pages"].as_array().cloned().unwrap_or_default();
    assert_eq!(pages.len(), 8);
    assert!(pages.iter().all(|p| p["allowed"] == true));

    let (status, _) = t.send("GET", "/audit-logs", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn catalog_defaults_to_caller_panel() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin_token().await?;

    let (status, v) = t.send("GET", "/access/catalog", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["panel"], "admin");

    let (_, v) = t.send("GET", "/access/catalog?panel=hotel", Some(&admin), None).await?;
    assert_eq!(v["data"]["panel"], "hotel");
    let modules = v["data"]["modules"].as_array().cloned().unwrap_or_default();
    assert!(modules.iter().all(|m| m["actions"] == json!(["view"])));

    Ok(())
}

#[tokio::test]
async fn hotel_grants_never_open_admin_endpoints() -> Result<()> {
    let t = common::spawn_app().await?;
    let admin = t.admin_token().await?;
    let hotel = t.create_hotel(&admin, "Harbour View").await?;
    let role = t.create_role(&admin, "Front Desk", "hotel", json!({ "support": ["view"] })).await?;
    let role_id = role["id"].as_str().unwrap_or_default().to_string();
    t.invite(&admin, "desk@example.com", &role_id, hotel["id"].as_str()).await?;

    // admin module grants written straight into the row
    sqlx::query("UPDATE roles SET permissions = ? WHERE id = ?")
        .bind(r#"{"support":["view"],"users":["view","export"],"audit":["view"]}"#)
        .bind(&role_id)
        .execute(&t.pool)
        .await?;
    let token = t.login("desk@example.com", PASSWORD).await?;

    for uri in ["/users", "/users/export", "/audit-logs"] {
        let (status, _) = t.send("GET", uri, Some(&token), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }

    let (_, v) = t.send("GET", "/access/check?module=users&action=view", Some(&token), None).await?;
    assert_eq!(v["data"]["allowed"], false);

    // the hotel page of the same name still opens
    let (_, v) = t.send("GET", "/access/pages/support", Some(&token), None).await?;
    assert_eq!(v["data"]["allowed"], true);

    Ok(())
}
