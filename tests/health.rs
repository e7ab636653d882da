mod common;

use anyhow::Result;
use axum::http::StatusCode;

#[tokio::test]
async fn health_reports_ok_with_reachable_db() -> Result<()> {
    let t = common::spawn_app().await?;

    let (status, v) = t.send("GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert_eq!(v["data"]["status"], "ok");
    assert_eq!(v["data"]["db_ok"], true);

    Ok(())
}

#[tokio::test]
async fn unknown_route_is_404() -> Result<()> {
    let t = common::spawn_app().await?;
    let resp = t.request("GET", "/api/does-not-exist", None, None).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}
