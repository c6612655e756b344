//! `poll`: a single engine tick, printed as JSON.

use tcc_config::Config;

use super::{Runtime, print_json};
use crate::error::CliError;

pub async fn handle(config: &Config) -> Result<(), CliError> {
    let rt = Runtime::build(config, false, true)?;
    let report = rt.engine.poll_once().await?;
    print_json(&report)
}
