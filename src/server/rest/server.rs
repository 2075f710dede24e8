use anyhow::{Context, Result};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::docker::{ContainerLifecycleManager, ContainerRuntime, DockerClient, PortAllocator};
use crate::server::rest::create_router;
use crate::shared::{AppState, Settings};

pub async fn run_rest_server(settings: Settings) -> Result<()> {
    // Log startup banner
    info!(
        r#"
     _            _                           _
  __| | ___   ___| | ___   _  __ _ _ __ __| |
 / _` |/ _ \ / __| |/ / | | |/ _` | '__/ _` |
| (_| | (_) | (__|   <| |_| | (_| | | | (_| |
 \__,_|\___/ \___|_|\_\\__, |\__,_|_|  \__,_|
                       |___/
Starting Docker orchestration API...
PID: {}
"#,
        process::id()
    );

    let range = settings
        .port_range()
        .context("Invalid host port range")?;
    info!("Host port pool: {} ({} ports)", range, range.capacity());

    info!("Connecting to Docker engine...");
    let docker = DockerClient::connect(&settings.docker())?;
    match docker.ping().await {
        Ok(()) => info!("Docker engine is reachable"),
        Err(e) => {
            warn!("Docker engine is not reachable: {}", e);
            warn!("Container endpoints will fail until the engine comes up");
        }
    }

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(docker);
    let manager = ContainerLifecycleManager::new(
        runtime,
        PortAllocator::new(range),
        settings.lifecycle(),
    );

    if settings.reconcile_ports {
        match manager.reconcile_ports().await {
            Ok(0) => info!("No managed containers to reconcile"),
            Ok(claimed) => info!("Re-reserved {} ports held by managed containers", claimed),
            Err(e) => error!("Port reconciliation failed: {}", e),
        }
    }

    let app_state = Arc::new(AppState {
        manager: Arc::new(manager),
    });

    info!("Building REST API routes...");
    let app = create_router(app_state);

    let bind_addr = settings.bind_addr();
    info!("Binding to: {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    info!("Server started successfully!");
    info!("REST API Endpoint: http://{}/containers", bind_addr);
    info!("Swagger UI: http://{}/swagger-ui/", bind_addr);
    info!("OpenAPI JSON: http://{}/api-docs/openapi.json", bind_addr);
    info!("Ready to accept requests...");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Docker orchestration API shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down Docker orchestration API...");
}
