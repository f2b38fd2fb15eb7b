//! End-to-end queue behavior against a real database: waiting strategies,
//! worker dispatch and registry lifecycle.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use drydock_db::models::{Job, JobState};
use drydock_db::repositories::JobRepo;
use drydock_queue::{
    EnqueueOptions, JobNotification, JobNotifier, JobProcessor, PollOptions, QueueRegistry,
    SubscribeOptions, WaitError,
};
use sqlx::PgPool;

/// Fast polling for tests; production defaults wait far too long here.
fn fast_poll() -> PollOptions {
    PollOptions {
        max_attempts: 100,
        poll_interval: Duration::from_millis(100),
        ..PollOptions::default()
    }
}

struct EchoProcessor;

#[async_trait]
impl JobProcessor for EchoProcessor {
    async fn process(&self, job: &Job) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!({ "echo": job.payload }))
    }
}

struct AlwaysFails;

#[async_trait]
impl JobProcessor for AlwaysFails {
    async fn process(&self, _job: &Job) -> anyhow::Result<serde_json::Value> {
        Err(anyhow::anyhow!("remote host rejected the command"))
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn wait_for_job_resolves_when_the_job_completes(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());
    let queue = registry.queue("server-1-delete-projects").await.unwrap();

    let job = queue
        .enqueue("teardown-1", &serde_json::json!({}), &EnqueueOptions::default())
        .await
        .unwrap();

    // Complete the job out of band while the waiter polls.
    let complete_pool = pool.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        JobRepo::complete(&complete_pool, job.id, &serde_json::json!({"ok": true}))
            .await
            .unwrap();
    });

    queue.wait_for_job("teardown-1", &fast_poll()).await.unwrap();
    assert_eq!(queue.state("teardown-1").await.unwrap(), JobState::Completed);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn wait_for_job_reports_the_failure_reason(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());
    let queue = registry.queue("server-1-delete-projects").await.unwrap();

    let job = queue
        .enqueue("teardown-2", &serde_json::json!({}), &EnqueueOptions::default())
        .await
        .unwrap();
    JobRepo::fail(&pool, job.id, "destroy command exited 1")
        .await
        .unwrap();

    let err = queue
        .wait_for_job("teardown-2", &fast_poll())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        WaitError::Failed { ref key, state: JobState::Failed, reason: Some(ref reason) }
            if key == "teardown-2" && reason == "destroy command exited 1"
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn wait_for_job_fails_immediately_for_missing_keys(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());
    let queue = registry.queue("server-1-delete-projects").await.unwrap();

    let started = std::time::Instant::now();
    let err = queue
        .wait_for_job("never-enqueued", &fast_poll())
        .await
        .unwrap_err();

    assert_matches!(err, WaitError::NotFound { ref key } if key == "never-enqueued");
    // A missing key must not burn the whole polling budget.
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn wait_for_job_times_out_when_nothing_happens(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());
    let queue = registry.queue("server-1-delete-projects").await.unwrap();

    queue
        .enqueue("stuck", &serde_json::json!({}), &EnqueueOptions::default())
        .await
        .unwrap();

    let options = PollOptions {
        max_attempts: 3,
        poll_interval: Duration::from_millis(10),
        ..PollOptions::default()
    };
    let err = queue.wait_for_job("stuck", &options).await.unwrap_err();
    assert_matches!(err, WaitError::TimedOut { ref key, .. } if key == "stuck");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn wait_for_job_id_resolves_on_a_notification(pool: PgPool) {
    let notifier = JobNotifier::new();
    let registry = QueueRegistry::new(pool.clone(), notifier.clone());
    let queue = registry.queue("server-1-delete-projects").await.unwrap();

    let job = queue
        .enqueue("teardown-3", &serde_json::json!({}), &EnqueueOptions::default())
        .await
        .unwrap();

    // Finish the job and notify, the way a worker would.
    let complete_pool = pool.clone();
    let complete_notifier = notifier.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        JobRepo::complete(&complete_pool, job.id, &serde_json::json!({}))
            .await
            .unwrap();
        complete_notifier.notify(JobNotification {
            queue_name: "server-1-delete-projects".to_string(),
            job_key: "teardown-3".to_string(),
            state: JobState::Completed,
            reason: None,
        });
    });

    let options = SubscribeOptions {
        timeout: Duration::from_secs(5),
        ..SubscribeOptions::default()
    };
    queue.wait_for_job_id("teardown-3", &options).await.unwrap();
}

#[sqlx::test(migrations = "../db/migrations")]
async fn wait_for_job_id_sees_jobs_already_terminal_before_subscribing(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());
    let queue = registry.queue("server-1-delete-projects").await.unwrap();

    let job = queue
        .enqueue("done-before", &serde_json::json!({}), &EnqueueOptions::default())
        .await
        .unwrap();
    JobRepo::complete(&pool, job.id, &serde_json::json!({}))
        .await
        .unwrap();

    // Resolves on the initial state check; no notification ever arrives.
    let options = SubscribeOptions {
        timeout: Duration::from_secs(5),
        ..SubscribeOptions::default()
    };
    queue.wait_for_job_id("done-before", &options).await.unwrap();
}

#[sqlx::test(migrations = "../db/migrations")]
async fn wait_for_job_id_times_out_without_notifications(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());
    let queue = registry.queue("server-1-delete-projects").await.unwrap();

    queue
        .enqueue("silent", &serde_json::json!({}), &EnqueueOptions::default())
        .await
        .unwrap();

    let options = SubscribeOptions {
        timeout: Duration::from_millis(200),
        ..SubscribeOptions::default()
    };
    let err = queue
        .wait_for_job_id("silent", &options)
        .await
        .unwrap_err();
    assert_matches!(err, WaitError::TimedOut { ref key, .. } if key == "silent");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn worker_processes_enqueued_jobs_end_to_end(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());
    let queue = registry.queue("server-2-deploy-app").await.unwrap();
    registry
        .worker("server-2-deploy-app", Arc::new(EchoProcessor))
        .await
        .unwrap();

    queue
        .enqueue(
            "deploy-1",
            &serde_json::json!({"app": "blog"}),
            &EnqueueOptions::default(),
        )
        .await
        .unwrap();

    queue.wait_for_job("deploy-1", &fast_poll()).await.unwrap();

    let job = JobRepo::find_by_key(&pool, "server-2-deploy-app", "deploy-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(JobState::from_id(job.state_id), JobState::Completed);
    assert_eq!(job.attempts, 1);
    assert_eq!(
        job.result,
        Some(serde_json::json!({"echo": {"app": "blog"}}))
    );
    assert!(job.finished_at.is_some());

    registry.shutdown().await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn failing_jobs_retry_then_exhaust_their_budget(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());
    let queue = registry.queue("server-2-deploy-app").await.unwrap();
    registry
        .worker("server-2-deploy-app", Arc::new(AlwaysFails))
        .await
        .unwrap();

    let options = EnqueueOptions {
        max_attempts: 2,
        ..EnqueueOptions::default()
    };
    queue
        .enqueue("deploy-2", &serde_json::json!({}), &options)
        .await
        .unwrap();

    // Two attempts with a ~2s backoff in between.
    let poll = PollOptions {
        max_attempts: 120,
        poll_interval: Duration::from_millis(100),
        ..PollOptions::default()
    };
    let err = queue.wait_for_job("deploy-2", &poll).await.unwrap_err();
    assert_matches!(
        err,
        WaitError::Failed { state: JobState::Failed, reason: Some(ref reason), .. }
            if reason.contains("remote host rejected the command")
    );

    let job = JobRepo::find_by_key(&pool, "server-2-deploy-app", "deploy-2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.attempts, 2);

    registry.shutdown().await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn worker_registration_is_idempotent(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());

    registry
        .worker("server-3-delete-project", Arc::new(EchoProcessor))
        .await
        .unwrap();
    registry
        .worker("server-3-delete-project", Arc::new(EchoProcessor))
        .await
        .unwrap();
    assert_eq!(registry.worker_count().await, 1);

    assert!(registry.close_worker("server-3-delete-project").await);
    assert!(!registry.close_worker("server-3-delete-project").await);
    assert_eq!(registry.worker_count().await, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn queue_handles_are_cached_by_name(pool: PgPool) {
    let registry = QueueRegistry::new(pool.clone(), JobNotifier::new());

    let first = registry.queue("server-4-delete-projects").await.unwrap();
    let second = registry.queue("server-4-delete-projects").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}
