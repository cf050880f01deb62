#![allow(dead_code)]
mod email;
mod error;
mod model;
mod prompt;
mod report;
mod request_tracing;
mod routes;
mod server_config;
mod state;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{extract::FromRef, Router};
use email::client::GraphMailClient;
use mimalloc::MiMalloc;
use model::user_profile::JsonProfileStore;
use report::{OrchestratorParts, ReportOrchestrator};
use routes::AppRouter;
use server_config::ServerConfig;
use tokio::signal;
use tokio_cron_scheduler::JobScheduler;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub orchestrator: Arc<ReportOrchestrator>,
    pub config: Arc<ServerConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let config = Arc::new(ServerConfig::load()?);
    println!("{}", config);

    let timeout = config.http.timeout();
    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(timeout)
        .build()?;

    let graph = Arc::new(
        GraphMailClient::new(
            http_client.clone(),
            &config.graph,
            config.report.fetch_limit,
            timeout,
        )
        .context("Graph client could not be configured")?,
    );
    let structuring =
        prompt::build_generator(&config.generation.structuring, http_client.clone(), timeout)?;
    let executive = prompt::build_generator(&config.generation.executive, http_client, timeout)?;

    let orchestrator = Arc::new(ReportOrchestrator::new(
        OrchestratorParts {
            profiles: Arc::new(JsonProfileStore::new(config.profiles.path.clone())),
            source: graph.clone(),
            sender: graph,
            structuring,
            executive,
        },
        config.report.clone(),
    )?);

    let state = ServerState {
        orchestrator: orchestrator.clone(),
        config: config.clone(),
    };
    let router = AppRouter::create(state);

    let mut scheduler = JobScheduler::new()
        .await
        .context("Failed to create scheduler")?;

    if config.schedule.enabled {
        scheduler
            .add(state::scheduler::weekly_report_job(
                orchestrator,
                &config.schedule,
            )?)
            .await?;
        tracing::info!(
            "Weekly report scheduled at '{}' for {:?}",
            config.schedule.cron,
            config.schedule.recipients
        );
    }

    scheduler.set_shutdown_handler(Box::new(move || {
        Box::pin(async move {
            tracing::info!("Shutting down scheduler");
        })
    }));

    scheduler.start().await.context("Failed to start scheduler")?;

    run_server(router, scheduler, config.server.port).await
}

async fn shutdown_signal(mut scheduler: JobScheduler) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {:?}", e);
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

    if let Err(e) = scheduler.shutdown().await {
        tracing::error!("Scheduler did not shut down cleanly: {:?}", e);
    }
    tracing::info!("Cleanups done, shutting down");
}

async fn run_server(router: Router, scheduler: JobScheduler, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Weekly report server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind {addr}"))?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(scheduler))
    .await?;

    Ok(())
}
