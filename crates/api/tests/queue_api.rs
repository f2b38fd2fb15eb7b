//! HTTP-level integration tests for the operational queue endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_empty};
use drydock_db::repositories::QueueRepo;
use drydock_queue::EnqueueOptions;
use sqlx::PgPool;

#[sqlx::test(migrations = "../db/migrations")]
async fn pausing_and_resuming_flips_the_queue_flag(pool: PgPool) {
    let state = common::test_state(pool.clone());

    let response = post_empty(
        common::router_for(state.clone()),
        "/api/queues/builds/pause",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["paused"], true);

    let queue = QueueRepo::find_by_name(&pool, "builds").await.unwrap().unwrap();
    assert!(queue.is_paused);

    let response = post_empty(
        common::router_for(state.clone()),
        "/api/queues/builds/resume",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let queue = QueueRepo::find_by_name(&pool, "builds").await.unwrap().unwrap();
    assert!(!queue.is_paused);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn job_state_endpoint_reports_the_derived_state(pool: PgPool) {
    let state = common::test_state(pool.clone());

    let queue = state.registry.queue("builds").await.unwrap();
    queue
        .enqueue(
            "build-1",
            &serde_json::json!({"target": "release"}),
            &EnqueueOptions::default(),
        )
        .await
        .unwrap();

    let response = get(
        common::router_for(state.clone()),
        "/api/queues/builds/jobs/build-1",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["state"], "waiting");
    assert_eq!(json["data"]["terminal"], false);

    // Pausing the queue changes what waiting jobs report.
    let response = post_empty(
        common::router_for(state.clone()),
        "/api/queues/builds/pause",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(
        common::router_for(state.clone()),
        "/api/queues/builds/jobs/build-1",
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["state"], "paused");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_job_key_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/queues/builds/jobs/no-such-job").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}
