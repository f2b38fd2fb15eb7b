//! HTTP-level tests for the workflow trigger endpoints, driven through
//! the router directly with no TCP listener.

mod common;

use axum::http::StatusCode;
use common::{body_json, post_empty, post_json};
use drydock_db::repositories::{ProjectRepo, ServerRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn teardown_unknown_server_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_empty(app, "/api/servers/4242/teardown").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn teardown_returns_202_with_the_coordinator_job(pool: PgPool) {
    let state = common::test_state(pool.clone());
    let app = common::router_for(state.clone());

    let server = ServerRepo::create(&pool, "edge-1", "203.0.113.9", "root", 22, None, true, None)
        .await
        .unwrap();

    let response = post_empty(app, &format!("/api/servers/{}/teardown", server.id)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    let queue_name = format!("server-{}-delete-projects", server.id);
    assert_eq!(json["data"]["queue_name"], queue_name.as_str());
    assert!(json["data"]["job_key"]
        .as_str()
        .unwrap()
        .starts_with("teardown-"));

    state.registry.shutdown().await;
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn deploy_unknown_project_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/projects/999/deploy",
        serde_json::json!({
            "repo_url": "https://git.example.com/blog.git",
            "branch": "main",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn deploy_rejects_a_blank_repo_url(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/projects/1/deploy",
        serde_json::json!({
            "repo_url": "   ",
            "branch": "main",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn deploy_returns_202_with_the_job_descriptor(pool: PgPool) {
    let state = common::test_state(pool.clone());
    let app = common::router_for(state.clone());

    let server = ServerRepo::create(&pool, "edge-2", "203.0.113.10", "root", 22, None, true, None)
        .await
        .unwrap();
    let project = ProjectRepo::create(&pool, server.id, "blog", "blog")
        .await
        .unwrap();

    let response = post_json(
        app,
        &format!("/api/projects/{}/deploy", project.id),
        serde_json::json!({
            "repo_url": "https://git.example.com/blog.git",
            "branch": "main",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    let queue_name = format!("server-{}-deploy-app", server.id);
    assert_eq!(json["data"]["queue_name"], queue_name.as_str());
    assert_eq!(json["data"]["payload"]["branch"], "main");

    state.registry.shutdown().await;
}
