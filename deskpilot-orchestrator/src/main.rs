use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod cleanup;
pub mod cluster;
pub mod completion;
pub mod config;
pub mod db;
pub mod ports;
pub mod readiness;
pub mod repository;
pub mod service;
pub mod viewer;

#[cfg(test)]
mod testing;

use cleanup::CleanupCoordinator;
use cluster::{ClusterGateway, KubeManifestRenderer, KubectlGateway};
use completion::CompletionWatcher;
use config::Config;
use ports::{PortAllocator, PortRegistry};
use readiness::ReadinessWaiter;
use repository::{AddressStore, DisabledAddressStore, MySqlAddressStore};
use service::{Collaborators, JobLifecycleManager, JobTracker, LifecycleSettings};
use viewer::{SshViewerLauncher, ViewerLauncher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deskpilot_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DeskPilot Orchestrator...");

    let config = Config::from_env().context("Invalid configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Node port ranges: {} / {}, namespace '{}', state in {}",
        config.vnc_range,
        config.web_range,
        config.namespace,
        config.state_dir.display()
    );

    let cluster: Arc<dyn ClusterGateway> = Arc::new(KubectlGateway::new(
        config.kubectl_command.clone(),
        config.namespace.clone(),
    )?);

    let allocator = PortAllocator::new(
        cluster.clone(),
        PortRegistry::new(
            config.vnc_range,
            config.state_dir.join("vnc_nodeport_registry.txt"),
            config.reservation_ttl,
        ),
        PortRegistry::new(
            config.web_range,
            config.state_dir.join("web_nodeport_registry.txt"),
            config.reservation_ttl,
        ),
    );

    let viewer: Option<Arc<dyn ViewerLauncher>> = match &config.viewer {
        Some(viewer) => {
            tracing::info!("Viewer launches go to {}@{}", viewer.user, viewer.host);
            Some(Arc::new(SshViewerLauncher::new(viewer.clone())))
        }
        None => {
            tracing::warn!("REMOTE_SSH_HOST not set, viewer launches disabled");
            None
        }
    };

    let addresses: Arc<dyn AddressStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).context("Invalid DATABASE_URL")?;
            tracing::info!("Address updates enabled");
            Arc::new(MySqlAddressStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, address updates disabled");
            Arc::new(DisabledAddressStore)
        }
    };

    let deps = Collaborators {
        cluster: cluster.clone(),
        renderer: Arc::new(KubeManifestRenderer::new(
            config.namespace.clone(),
            config.workload.clone(),
        )),
        allocator,
        readiness: Arc::new(ReadinessWaiter::new(config.readiness_poll_interval)),
        viewer,
        addresses,
        completion: CompletionWatcher::new(cluster.clone(), config.completion_sentinel.clone()),
        cleanup: CleanupCoordinator::new(cluster),
    };

    let lifecycle = Arc::new(JobLifecycleManager::new(
        LifecycleSettings::from_config(&config),
        deps,
        Arc::new(JobTracker::with_retention(
            config.job_retention,
            config.lifecycle_step_bound(),
        )),
    ));

    // Build router with all API endpoints
    let app = api::create_router(api::AppState { lifecycle });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}
