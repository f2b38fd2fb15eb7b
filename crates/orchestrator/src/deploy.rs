//! Application deployment over the transport.

use async_trait::async_trait;
use drydock_core::glyphs::{GLYPH_SUCCESS, GLYPH_WARNING};
use drydock_core::types::DbId;
use drydock_db::models::Job;
use drydock_db::repositories::ServerRepo;
use drydock_events::{LogScope, ProgressSink};
use drydock_queue::JobProcessor;
use serde::Deserialize;

use crate::commands;
use crate::orchestrator::{session_config, Orchestrator};

/// What to deploy. Supplied by the caller and carried in the job payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployRequest {
    pub repo_url: String,
    pub branch: String,
}

#[derive(Deserialize)]
struct DeployPayload {
    project_id: DbId,
    server_id: DbId,
    app_name: String,
    repo_url: String,
    branch: String,
}

/// Processor for `server-<id>-deploy-app`.
///
/// Creates the app when it is missing, then build-deploys the requested
/// branch, republishing the tool's output to the project's log scope.
pub struct DeployProcessor {
    orchestrator: Orchestrator,
}

impl DeployProcessor {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobProcessor for DeployProcessor {
    async fn process(&self, job: &Job) -> anyhow::Result<serde_json::Value> {
        let payload: DeployPayload = serde_json::from_value(job.payload.clone())?;
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
        if !exists.success() {
            sink.send(format!("Creating app {}", payload.app_name)).await;
            let created = session.exec(&commands::create_app(&payload.app_name)).await;
            if !created.success() {
                session.close().await;
                sink.send(format!(
                    "{GLYPH_WARNING} Deploy failed: could not create app (exit {})",
                    created.exit_code
                ))
                .await;
                anyhow::bail!(
                    "create command exited {}: {}",
                    created.exit_code,
                    created.error_text()
                );
            }
        }

        sink.send(format!(
            "Deploying {} ({}) to {}",
            payload.repo_url, payload.branch, payload.app_name
        ))
        .await;
        let synced = session
            .exec(&commands::sync_app(
                &payload.app_name,
                &payload.repo_url,
                &payload.branch,
            ))
            .await;
        session.close().await;

        // Republish the build output line by line for anyone watching.
        for line in synced.stdout.lines().filter(|line| !line.trim().is_empty()) {
            sink.send(line).await;
        }

        if !synced.success() {
            sink.send(format!(
                "{GLYPH_WARNING} Deploy of {} failed (exit {})",
                payload.app_name, synced.exit_code
            ))
            .await;
            anyhow::bail!(
                "deploy command exited {}: {}",
                synced.exit_code,
                synced.error_text()
            );
        }

        sink.send(format!("{GLYPH_SUCCESS} App {} deployed", payload.app_name))
            .await;
        Ok(serde_json::json!({
            "app": payload.app_name,
            "branch": payload.branch,
        }))
    }
}
