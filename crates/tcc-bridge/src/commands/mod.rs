//! Command dispatch: wires config into the cloud client, store, bridge
//! and engine, then hands off to the per-command handlers.

pub mod config_cmd;
pub mod control;
pub mod credentials;
pub mod poll;
pub mod run;

use std::sync::Arc;

use serde::Serialize;

use tcc_api::CloudClient;
use tcc_api::bridge::BridgeClient;
use tcc_config::{Config, ConfigError};
use tcc_core::{DisabledSink, MemoryStore, ProtocolSink, SyncEngine};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Load config from `--config` or the platform path.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let config = match global.config {
        Some(ref path) => tcc_config::load_config_from(path)?,
        None => tcc_config::load_config()?,
    };
    Ok(config)
}

/// Everything a command needs, built once per invocation.
pub struct Runtime {
    pub engine: Arc<SyncEngine>,
    pub store: Arc<MemoryStore>,
    pub bridge: Option<BridgeClient>,
}

impl Runtime {
    /// `require_credentials` is false for commands that bring their own.
    pub fn build(
        config: &Config,
        with_bridge: bool,
        require_credentials: bool,
    ) -> Result<Self, CliError> {
        let cloud = Arc::new(CloudClient::new(config.cloud_config()?)?);
        match tcc_config::resolve_credentials(&config.credentials) {
            Ok((username, password)) => cloud.set_credentials(username, password),
            Err(ConfigError::NoCredentials | ConfigError::NoPassword { .. })
                if !require_credentials => {}
            Err(e) => return Err(e.into()),
        }

        let bridge = match config.bridge_url()? {
            Some(url) if with_bridge => Some(BridgeClient::new(url, &config.transport())?),
            _ => None,
        };
        let sink: Arc<dyn ProtocolSink> = match bridge {
            Some(ref client) => Arc::new(client.clone()),
            None => Arc::new(DisabledSink),
        };

        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(SyncEngine::new(
            cloud,
            store.clone(),
            sink,
            config.poll_interval(),
        ));
        Ok(Self {
            engine,
            store,
            bridge,
        })
    }
}

/// Dispatch a portal-bound command to its handler.
pub async fn dispatch(cmd: Command, config: &Config) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(&args, config).await,
        Command::Poll => poll::handle(config).await,
        Command::TestCredentials(args) => credentials::handle(args, config).await,
        Command::SetMode(args) => control::set_mode(&args, config).await,
        Command::SetSetpoint(args) => control::set_setpoint(&args, config).await,
        // Config is handled before dispatch
        Command::Config(args) => Err(CliError::Internal {
            message: format!("config command reached dispatch: {args:?}"),
        }),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
