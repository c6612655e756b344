//! `run`: the long-lived service.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tcc_api::bridge::{CommandStream, ReconnectConfig};
use tcc_config::Config;

use super::Runtime;
use crate::cli::RunArgs;
use crate::error::CliError;

pub async fn handle(args: &RunArgs, config: &Config) -> Result<(), CliError> {
    let rt = Runtime::build(config, !args.no_bridge, true)?;
    let cancel = CancellationToken::new();

    let poll_task = {
        let engine = rt.engine.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.run(cancel).await })
    };

    let command_task = match rt.bridge {
        Some(ref bridge) => {
            match bridge.status().await {
                Ok(status) => info!(
                    running = status.running,
                    commissioned = status.commissioned,
                    peers = status.connected_peers,
                    "bridge reachable"
                ),
                Err(e) => warn!(error = %e, "bridge not reachable yet, pushes will fail until it is"),
            }
            let stream =
                CommandStream::connect(bridge.events_url()?, ReconnectConfig::default(), cancel.clone());
            let engine = rt.engine.clone();
            let cancel = cancel.clone();
            Some(tokio::spawn(async move {
                engine.serve_commands(stream, cancel).await;
            }))
        }
        None => {
            info!("bridge disabled, running poll loop only");
            None
        }
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    cancel.cancel();

    let joined = poll_task.await;
    if let Some(task) = command_task {
        task.await.map_err(|e| CliError::Internal {
            message: e.to_string(),
        })?;
    }
    joined.map_err(|e| CliError::Internal {
        message: e.to_string(),
    })?;

    let status = rt.engine.status();
    info!(
        devices = status.device_count,
        events = rt.store.event_count(),
        "stopped"
    );
    Ok(())
}
