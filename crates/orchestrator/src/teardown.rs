//! Cascading server teardown.
//!
//! Deleting a server is a two-phase barrier. Phase one fans out one
//! deletion job per project and waits for every child to reach a terminal
//! state. Phase two releases the machine itself, gated on confirmed
//! terminal states for the children that succeeded. A machine is never
//! released while a project deletion is still in flight.

use async_trait::async_trait;
use drydock_core::glyphs::{GLYPH_INFO, GLYPH_SUCCESS, GLYPH_WARNING};
use drydock_core::naming;
use drydock_core::types::DbId;
use drydock_db::models::{Job, Project, Server};
use drydock_db::repositories::{ProjectRepo, ServerRepo};
use drydock_events::{LogScope, MutationEvent, Operation, ProgressSink};
use drydock_queue::{EnqueueOptions, JobProcessor, PollOptions, SubscribeOptions};
use futures::future::join_all;
use serde::Deserialize;

use crate::commands;
use crate::orchestrator::{session_config, Orchestrator};

// ---------------------------------------------------------------------------
// Workflow object
// ---------------------------------------------------------------------------

/// Wait tuning for the teardown phases.
#[derive(Debug, Clone, Default)]
pub struct TeardownOptions {
    /// Polling options used while awaiting child jobs.
    pub poll: PollOptions,
    /// Subscription options for the release gate.
    pub subscribe: SubscribeOptions,
}

/// Stage-labelled teardown failure, so operators can tell a failed child
/// phase from a failed release.
#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    #[error("child teardown failed: {0}")]
    ChildPhase(String),
    #[error("server release failed: {0}")]
    Finalize(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Counts for a finished teardown, stored as the coordinator job result.
#[derive(Debug, serde::Serialize)]
pub struct TeardownSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// A child job that made it onto the queue.
struct ChildJob {
    project_name: String,
    job_key: String,
}

/// Fan-out result: enqueued children plus projects that never enqueued.
struct SpawnedChildren {
    children: Vec<ChildJob>,
    failed_spawns: Vec<String>,
}

/// Aggregated child outcomes.
struct TeardownOutcome {
    /// Job keys of children that completed.
    succeeded: Vec<String>,
    /// Names of projects whose deletion failed or never enqueued.
    failed: Vec<String>,
}

/// One server teardown in flight.
///
/// Constructed by [`TeardownProcessor`] inside the coordinator job, and
/// directly by tests that want to drive the workflow without a worker.
pub struct ServerTeardown {
    orchestrator: Orchestrator,
    server: Server,
    sink: ProgressSink,
    options: TeardownOptions,
}

impl ServerTeardown {
    pub fn new(orchestrator: Orchestrator, server: Server, options: TeardownOptions) -> Self {
        let sink = ProgressSink::new(orchestrator.inner.bus.clone(), LogScope::server(server.id));
        Self {
            orchestrator,
            server,
            sink,
            options,
        }
    }

    fn child_queue_name(&self) -> String {
        naming::queue_name("server", self.server.id, "delete-project")
    }

    /// Run the whole workflow: fan out, aggregate, gate, release.
    ///
    /// With no projects to tear down, fan-out and gate are skipped and the
    /// release runs directly. A fan-out where every child failed blocks
    /// the release; partial failure does not.
    pub async fn run(&self) -> Result<TeardownSummary, TeardownError> {
        let projects =
            ProjectRepo::list_by_server(&self.orchestrator.inner.pool, self.server.id).await?;

        if projects.is_empty() {
            self.sink
                .send(format!(
                    "{GLYPH_INFO} No projects found, releasing server directly"
                ))
                .await;
            self.finalize(&[]).await?;
            return Ok(TeardownSummary {
                total: 0,
                succeeded: 0,
                failed: 0,
            });
        }

        let total = projects.len();
        let spawned = self.spawn_children(&projects).await;
        let outcome = self.await_all(spawned).await;

        if outcome.succeeded.is_empty() {
            return Err(TeardownError::ChildPhase(format!(
                "all {} project deletions failed",
                outcome.failed.len()
            )));
        }
        self.finalize(&outcome.succeeded).await?;

        Ok(TeardownSummary {
            total,
            succeeded: outcome.succeeded.len(),
            failed: outcome.failed.len(),
        })
    }

    /// Fan out one deletion job per project, all enqueues concurrent.
    ///
    /// An enqueue failure is logged and counted as a failed outcome; it
    /// never aborts the rest of the fan-out.
    async fn spawn_children(&self, projects: &[Project]) -> SpawnedChildren {
        let queue = match self
            .orchestrator
            .inner
            .registry
            .queue(&self.child_queue_name())
            .await
        {
            Ok(queue) => queue,
            Err(e) => {
                tracing::error!(server_id = self.server.id, error = %e, "Child queue unavailable");
                return SpawnedChildren {
                    children: Vec::new(),
                    failed_spawns: projects.iter().map(|p| p.name.clone()).collect(),
                };
            }
        };

        let enqueues = projects.iter().map(|project| {
            let queue = queue.clone();
            async move {
                let job_key = naming::job_key(&format!("delete-project-{}", project.id));
                let payload = serde_json::json!({
                    "project_id": project.id,
                    "server_id": project.server_id,
                    "project_name": project.name,
                    "app_name": project.app_name,
                });
                match queue
                    .enqueue(&job_key, &payload, &EnqueueOptions::default())
                    .await
                {
                    Ok(_) => Ok(ChildJob {
                        project_name: project.name.clone(),
                        job_key,
                    }),
                    Err(e) => {
                        tracing::error!(
                            project = %project.name,
                            error = %e,
                            "Failed to enqueue project deletion"
                        );
                        Err(project.name.clone())
                    }
                }
            }
        });

        let mut spawned = SpawnedChildren {
            children: Vec::new(),
            failed_spawns: Vec::new(),
        };
        for result in join_all(enqueues).await {
            match result {
                Ok(child) => spawned.children.push(child),
                Err(project_name) => spawned.failed_spawns.push(project_name),
            }
        }
        spawned
    }

    /// Wait for every spawned child, classify outcomes, and publish one
    /// summary event carrying both counts.
    async fn await_all(&self, spawned: SpawnedChildren) -> TeardownOutcome {
        let mut outcome = TeardownOutcome {
            succeeded: Vec::new(),
            failed: spawned.failed_spawns,
        };

        match self
            .orchestrator
            .inner
            .registry
            .queue(&self.child_queue_name())
            .await
        {
            Ok(queue) => {
                let waits = spawned.children.iter().map(|child| {
                    let queue = queue.clone();
                    async move {
                        (
                            child,
                            queue.wait_for_job(&child.job_key, &self.options.poll).await,
                        )
                    }
                });
                for (child, result) in join_all(waits).await {
                    match result {
                        Ok(()) => outcome.succeeded.push(child.job_key.clone()),
                        Err(e) => {
                            tracing::warn!(
                                project = %child.project_name,
                                error = %e,
                                "Project deletion did not complete"
                            );
                            outcome.failed.push(child.project_name.clone());
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    server_id = self.server.id,
                    error = %e,
                    "Child queue unavailable, counting children as failed"
                );
                outcome
                    .failed
                    .extend(spawned.children.into_iter().map(|c| c.project_name));
            }
        }

        let total = outcome.succeeded.len() + outcome.failed.len();
        if outcome.failed.is_empty() {
            self.sink
                .send(format!(
                    "{GLYPH_SUCCESS} Deleted {} of {total} projects",
                    outcome.succeeded.len()
                ))
                .await;
        } else {
            self.sink
                .send(format!(
                    "{GLYPH_WARNING} Project teardown finished: {} succeeded, {} failed",
                    outcome.succeeded.len(),
                    outcome.failed.len()
                ))
                .await;
        }
        outcome
    }

    /// Release the machine.
    ///
    /// Gates on a confirmed terminal state for every succeeded child key
    /// (failed children are already terminal), then deregisters the mesh
    /// device, releases the server row and notifies listeners.
    async fn finalize(&self, succeeded: &[String]) -> Result<(), TeardownError> {
        if !succeeded.is_empty() {
            let queue = self
                .orchestrator
                .inner
                .registry
                .queue(&self.child_queue_name())
                .await?;
            for job_key in succeeded {
                queue
                    .wait_for_job_id(job_key, &self.options.subscribe)
                    .await
                    .map_err(|e| {
                        TeardownError::Finalize(format!("gate on child job {job_key}: {e}"))
                    })?;
            }
        }

        if let (Some(mesh), Some(device_id)) = (
            &self.orchestrator.inner.mesh,
            self.server.mesh_device_id.as_deref(),
        ) {
            self.sink
                .send(format!("Removing device {device_id} from the mesh"))
                .await;
            mesh.remove_device(device_id)
                .await
                .map_err(|e| TeardownError::Finalize(format!("mesh deregistration: {e}")))?;
        }

        ServerRepo::release(&self.orchestrator.inner.pool, self.server.id).await?;

        match serde_json::to_value(&self.server) {
            Ok(doc) => {
                let webhooks = self.orchestrator.inner.webhooks.clone();
                tokio::spawn(async move {
                    webhooks
                        .dispatch(MutationEvent::new(Operation::Delete, "servers", doc))
                        .await;
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize server for webhook delivery");
            }
        }
        self.orchestrator.inner.bus.publish_refresh("servers");
        self.sink
            .send(format!("{GLYPH_SUCCESS} Server {} released", self.server.name))
            .await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queue processors
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TeardownPayload {
    server_id: DbId,
}

/// Coordinator processor for `server-<id>-delete-projects`.
pub struct TeardownProcessor {
    orchestrator: Orchestrator,
}

impl TeardownProcessor {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobProcessor for TeardownProcessor {
    async fn process(&self, job: &Job) -> anyhow::Result<serde_json::Value> {
        let payload: TeardownPayload = serde_json::from_value(job.payload.clone())?;
        let server = ServerRepo::find_by_id(&self.orchestrator.inner.pool, payload.server_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("server {} not found", payload.server_id))?;

        let teardown = ServerTeardown::new(
            self.orchestrator.clone(),
            server,
            TeardownOptions::default(),
        );
        let summary = teardown.run().await?;
        Ok(serde_json::to_value(summary)?)
    }
}

#[derive(Deserialize)]
struct DeleteProjectPayload {
    project_id: DbId,
    server_id: DbId,
    project_name: String,
    app_name: String,
}

/// Child processor for `server-<id>-delete-project`.
///
/// Destroys the app on the remote machine, then removes the project row.
/// Safe to re-run: an app that is already gone skips the destroy and a
/// missing row skips the delete.
pub struct DeleteProjectProcessor {
    orchestrator: Orchestrator,
}

impl DeleteProjectProcessor {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobProcessor for DeleteProjectProcessor {
    async fn process(&self, job: &Job) -> anyhow::Result<serde_json::Value> {
        let payload: DeleteProjectPayload = serde_json::from_value(job.payload.clone())?;
        let inner = &self.orchestrator.inner;

        let server = ServerRepo::find_by_id(&inner.pool, payload.server_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("server {} not found", payload.server_id))?;

        let sink = ProgressSink::new(
            inner.bus.clone(),
            LogScope::server(server.id).with_service(payload.project_id),
        );

        let config = session_config(&server);
        let session = drydock_transport::connect(&config, &inner.transport).await?;

        let exists = session.exec(&commands::app_exists(&payload.app_name)).await;
        if exists.success() {
            sink.send(format!("Destroying app {}", payload.app_name)).await;
            let destroyed = session.exec(&commands::destroy_app(&payload.app_name)).await;
            if !destroyed.success() {
                session.close().await;
                sink.send(format!(
                    "{GLYPH_WARNING} Project {} teardown failed (exit {})",
                    payload.project_name, destroyed.exit_code
                ))
                .await;
                anyhow::bail!(
                    "destroy command exited {}: {}",
                    destroyed.exit_code,
                    destroyed.error_text()
                );
            }
        } else {
            sink.send(format!(
                "App {} already absent, skipping destroy",
                payload.app_name
            ))
            .await;
        }
        session.close().await;

        if ProjectRepo::delete(&inner.pool, payload.project_id).await? {
            let doc = serde_json::json!({
                "id": payload.project_id,
                "server_id": payload.server_id,
                "name": payload.project_name,
                "app_name": payload.app_name,
            });
            let webhooks = inner.webhooks.clone();
            tokio::spawn(async move {
                webhooks
                    .dispatch(MutationEvent::new(Operation::Delete, "projects", doc))
                    .await;
            });
            inner.bus.publish_refresh("projects");
        }

        sink.send(format!(
            "{GLYPH_SUCCESS} Project {} deleted",
            payload.project_name
        ))
        .await;
        Ok(serde_json::json!({
            "project": payload.project_name,
            "app": payload.app_name,
        }))
    }
}
