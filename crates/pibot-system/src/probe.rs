//! Status probes for the local host.
//!
//! Hostname, uptime and disk figures come from `sysinfo`; local addresses
//! from interface enumeration; the external address and its geolocation from
//! public lookup services.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sysinfo::{Disks, System};

use pibot_core::{domain::GeoPoint, errors::Error, system::SystemProbe, Result};

const EXTERNAL_IP_URL: &str = "https://api.ipify.org";
// The free ip-api tier is plain http; https is reserved for keyed plans.
const GEO_URL_BASE: &str = "http://ip-api.com/json";
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// `SystemProbe` implementation over the board pibot runs on.
pub struct HostProbe {
    http: reqwest::Client,
}

impl HostProbe {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemProbe for HostProbe {
    async fn hostname(&self) -> Result<String> {
        System::host_name().ok_or_else(|| Error::Probe("hostname unavailable".to_string()))
    }

    async fn ip_addresses(&self) -> Vec<String> {
        let Ok(interfaces) = get_if_addrs::get_if_addrs() else {
            return Vec::new();
        };

        interfaces
            .iter()
            .filter(|iface| !iface.is_loopback())
            .map(|iface| iface.ip().to_string())
            .collect()
    }

    async fn external_ip(&self) -> Result<String> {
        let resp = self
            .http
            .get(EXTERNAL_IP_URL)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Probe(format!("external ip lookup failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Probe(format!(
                "external ip lookup returned {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Probe(format!("external ip lookup failed: {e}")))?;
        Ok(body.trim().to_string())
    }

    async fn uptime(&self) -> Result<String> {
        Ok(format_uptime(System::uptime()))
    }

    async fn free_spaces(&self) -> Result<String> {
        let disks = Disks::new_with_refreshed_list();
        if disks.list().is_empty() {
            return Err(Error::Probe("no disks found".to_string()));
        }

        let lines: Vec<String> = disks
            .list()
            .iter()
            .map(|disk| {
                format!(
                    "{}: {} free of {}",
                    disk.mount_point().display(),
                    format_bytes(disk.available_space()),
                    format_bytes(disk.total_space()),
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }

    async fn geo_location(&self, ip: &str) -> Result<GeoPoint> {
        let url = format!("{GEO_URL_BASE}/{ip}");
        let resp = self
            .http
            .get(&url)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Probe(format!("geo lookup failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Probe(format!(
                "geo lookup returned {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Probe(format!("geo lookup failed: {e}")))?;
        parse_geo_response(&body)
    }
}

/// ip-api.com response (subset of fields we care about).
#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    message: Option<String>,
}

fn parse_geo_response(body: &str) -> Result<GeoPoint> {
    let parsed: GeoResponse = serde_json::from_str(body)
        .map_err(|e| Error::Probe(format!("geo lookup returned invalid json: {e}")))?;

    if parsed.status != "success" {
        return Err(Error::Probe(format!(
            "geo lookup rejected: {}",
            parsed.message.unwrap_or_else(|| parsed.status.clone())
        )));
    }

    Ok(GeoPoint {
        latitude: parsed.lat,
        longitude: parsed.lon,
    })
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        return format!("{days}d {hours}h {mins}m");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        return format!("{bytes} B");
    }
    format!("{value:.1} {}", UNITS[unit])
}
