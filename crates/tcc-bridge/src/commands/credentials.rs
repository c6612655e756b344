//! `test-credentials`.

use secrecy::SecretString;

use tcc_config::Config;

use super::Runtime;
use crate::cli::TestCredentialsArgs;
use crate::error::CliError;

pub async fn handle(args: TestCredentialsArgs, config: &Config) -> Result<(), CliError> {
    let rt = Runtime::build(config, false, false)?;

    let (username, password) = match (args.username, args.password) {
        (Some(username), Some(password)) => (username, SecretString::from(password)),
        (username, password) => {
            let mut creds = config.credentials.clone();
            if username.is_some() {
                creds.username = username;
            }
            if password.is_some() {
                creds.password = password;
            }
            tcc_config::resolve_credentials(&creds)?
        }
    };

    let devices = rt.engine.test_credentials(username, password).await?;
    println!("Credentials OK: {} thermostat(s) found", devices.len());
    for device in &devices {
        println!("  {:>10}  {}", device.device_id, device.name);
    }
    Ok(())
}
