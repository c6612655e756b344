//! `set-mode` and `set-setpoint`.

use tcc_config::Config;
use tcc_core::{CommandOutcome, DeviceId, SetpointKind, SystemMode};

use super::{Runtime, print_json};
use crate::cli::{SetModeArgs, SetSetpointArgs};
use crate::error::CliError;

pub async fn set_mode(args: &SetModeArgs, config: &Config) -> Result<(), CliError> {
    let rt = Runtime::build(config, false, true)?;
    // Populate the store so the change is logged against the current state.
    rt.engine.poll_once().await?;
    let mode = SystemMode::from(args.mode);
    let outcome = rt.engine.set_mode(args.device.map(DeviceId), mode).await?;
    report(outcome)
}

pub async fn set_setpoint(args: &SetSetpointArgs, config: &Config) -> Result<(), CliError> {
    let rt = Runtime::build(config, false, true)?;
    rt.engine.poll_once().await?;
    let kind = SetpointKind::from(args.kind);
    let outcome = rt
        .engine
        .set_setpoint(args.device.map(DeviceId), kind, args.value)
        .await?;
    report(outcome)
}

fn report(outcome: CommandOutcome) -> Result<(), CliError> {
    match outcome {
        CommandOutcome::Applied {
            device: Some(device),
        } => print_json(&device),
        CommandOutcome::Applied { device: None } => {
            eprintln!("Change accepted; the refreshed state was not available yet.");
            Ok(())
        }
        CommandOutcome::Suppressed => Ok(()),
    }
}
