//! Privileged power actions, shelling out to `shutdown(8)` via sudo.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use pibot_core::{errors::Error, system::PowerControl, Result};

/// `PowerControl` implementation for the local host.
///
/// Requires passwordless sudo for `shutdown`; the sudoers entry is part of
/// the board's provisioning.
pub struct HostPower;

impl HostPower {
    pub fn new() -> Self {
        Self
    }

    async fn run_shutdown(&self, flag: &str) -> Result<String> {
        let output = Command::new("sudo")
            .args(["shutdown", flag, "now"])
            .output()
            .await?;

        let combined = combine_output(&output.stdout, &output.stderr);
        if output.status.success() {
            return Ok(combined);
        }

        if combined.is_empty() {
            return Err(Error::Power(format!(
                "shutdown exited with status {}",
                output.status
            )));
        }
        Err(Error::Power(combined))
    }
}

impl Default for HostPower {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PowerControl for HostPower {
    async fn reboot_now(&self) -> Result<String> {
        info!("rebooting the machine");
        self.run_shutdown("-r").await
    }

    async fn shutdown_now(&self) -> Result<String> {
        info!("shutting down the machine");
        self.run_shutdown("-h").await
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr);
    }
    combined
}
