mod completion;
mod config;
mod dispatcher;
mod error;
mod failover;
mod handlers;
mod job;
mod phase;
mod registry;
mod state;
mod workers;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::job::Job;
use crate::state::AppState;

const DONE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mr_master=debug,tower_http=info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    info!(
        maps = config.files.len(),
        reduces = config.n_reduce,
        timeout_secs = config.task_timeout.as_secs(),
        "job creado"
    );

    let state = AppState::new(Job::new(
        &config.files,
        config.n_reduce,
        config.task_timeout,
    )?);

    // router HTTP
    let app = handlers::build_router(state.clone());

    // detector de fallos en segundo plano
    let failover = tokio::spawn(failover::run_failover_loop(
        state.clone(),
        config.sweep_interval,
    ));

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", config.addr))?;
    info!("master escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state, config.linger))
        .await?;

    failover.abort();
    info!("master terminado");
    Ok(())
}

/// Se resuelve cuando el job termina (después de `linger`, para que los
/// workers que sigan preguntando reciban EXIT) o con ctrl-c.
async fn shutdown_signal(state: AppState, linger: Duration) {
    tokio::select! {
        _ = wait_until_done(&state) => {
            info!("job terminado, cerrando en {:?}", linger);
            tokio::time::sleep(linger).await;
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("no se pudo escuchar ctrl-c: {}", e);
            }
            warn!("ctrl-c recibido, cerrando master sin terminar el job");
        }
    }
}

async fn wait_until_done(state: &AppState) {
    let mut ticker = tokio::time::interval(DONE_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        if state.is_done() {
            return;
        }
    }
}
