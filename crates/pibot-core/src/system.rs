use async_trait::async_trait;

use crate::{domain::GeoPoint, Result};

/// Read-only host status probes.
///
/// Each probe fails independently; callers degrade the affected field
/// instead of aborting a composite report.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn hostname(&self) -> Result<String>;

    /// Non-loopback local addresses. Empty when none could be read.
    async fn ip_addresses(&self) -> Vec<String>;

    async fn external_ip(&self) -> Result<String>;

    async fn uptime(&self) -> Result<String>;

    /// Per-filesystem free-space report, one line per mount.
    async fn free_spaces(&self) -> Result<String>;

    /// Resolve an approximate position for a public address.
    async fn geo_location(&self, ip: &str) -> Result<GeoPoint>;
}

/// Privileged power actions.
///
/// `Ok` carries the command's output; `Err` carries the diagnostic text
/// relayed to the user. Either way the host may go down before the caller
/// sees the result.
#[async_trait]
pub trait PowerControl: Send + Sync {
    async fn reboot_now(&self) -> Result<String>;

    async fn shutdown_now(&self) -> Result<String>;
}
