//! Remote command channel
//!
//! Executes administrative shell commands on the appliance through the
//! `/mgmt/tm/util/bash` endpoint. The command string is embedded verbatim
//! into a shell invocation on the device side: this is a privileged,
//! operator-controlled surface. Nothing derived from an inbound event
//! payload may be passed here.

use serde::Deserialize;
use tracing::debug;

use crate::client::DeviceClient;
use crate::errors::BigipError;

/// Opaque output of one remote command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub raw_output: String,
}

#[derive(Debug, Deserialize)]
struct BashResponse {
    #[serde(rename = "commandResult")]
    command_result: Option<String>,
}

impl DeviceClient {
    /// Run an administrative command on the device.
    pub async fn run_command(&self, command: &str) -> Result<CommandResult, BigipError> {
        debug!("Running remote command: {}", command);

        let payload = serde_json::json!({
            "command": "run",
            "utilCmdArgs": format!(" -c '{}'", command),
        });

        let response = self.post("/mgmt/tm/util/bash", &payload).await?;
        let raw_output = match response {
            Some(value) => {
                let parsed: BashResponse = serde_json::from_value(value)?;
                parsed.command_result.unwrap_or_default()
            }
            None => String::new(),
        };

        Ok(CommandResult { raw_output })
    }
}
