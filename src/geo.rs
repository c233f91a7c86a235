// Public IP, ISP and location lookup. Best-effort and time-bounded; degrades to "Unknown".

use crate::models::GeoInfo;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, instrument};

/// ipinfo.io style response; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpInfoResponse {
    ip: String,
    org: String,
    loc: String,
    city: String,
    region: String,
    country: String,
}

impl IpInfoResponse {
    fn into_geo(self) -> GeoInfo {
        GeoInfo {
            public_ip: non_empty_or_unknown(self.ip),
            isp: non_empty_or_unknown(self.org),
            location: format_location(&self.loc, &self.city, &self.region, &self.country),
        }
    }
}

fn non_empty_or_unknown(s: String) -> String {
    if s.trim().is_empty() {
        GeoInfo::UNKNOWN.to_string()
    } else {
        s
    }
}

/// "loc, city, region, country" skipping blanks; "Unknown" when all are blank.
pub fn format_location(loc: &str, city: &str, region: &str, country: &str) -> String {
    let parts: Vec<&str> = [loc, city, region, country]
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        GeoInfo::UNKNOWN.to_string()
    } else {
        parts.join(", ")
    }
}

pub struct GeoLookup {
    client: reqwest::Client,
    url: String,
    fallback_url: String,
}

impl GeoLookup {
    pub fn new(url: String, fallback_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url,
            fallback_url,
        })
    }

    /// Full lookup, then plain-IP fallback, then all "Unknown". Never errors.
    #[instrument(skip(self), fields(operation = "geo_lookup"))]
    pub async fn lookup(&self) -> GeoInfo {
        match self.lookup_full().await {
            Ok(geo) => geo,
            Err(e) => {
                debug!(error = %e, url = %self.url, "geo lookup failed; trying IP-only fallback");
                match self.lookup_ip_only().await {
                    Ok(ip) => GeoInfo {
                        public_ip: ip,
                        ..GeoInfo::unknown()
                    },
                    Err(e) => {
                        debug!(error = %e, url = %self.fallback_url, "IP fallback failed");
                        GeoInfo::unknown()
                    }
                }
            }
        }
    }

    async fn lookup_full(&self) -> anyhow::Result<GeoInfo> {
        let resp: IpInfoResponse = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.into_geo())
    }

    async fn lookup_ip_only(&self) -> anyhow::Result<String> {
        let text = self
            .client
            .get(&self.fallback_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let ip = text.trim();
        anyhow::ensure!(!ip.is_empty(), "empty response");
        Ok(ip.to_string())
    }
}

/// Refresh the lookup periodically into `slot`. The first lookup runs immediately.
pub fn spawn_geo_worker(
    lookup: Arc<GeoLookup>,
    slot: watch::Sender<Option<GeoInfo>>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let geo = lookup.lookup().await;
                    debug!(public_ip = %geo.public_ip, isp = %geo.isp, "geo info refreshed");
                    slot.send_replace(Some(geo));
                }
                _ = shutdown_rx.changed() => {
                    tracing::debug!("Geo worker shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_joins_present_parts() {
        assert_eq!(
            format_location("52.37,4.89", "Amsterdam", "North Holland", "NL"),
            "52.37,4.89, Amsterdam, North Holland, NL"
        );
        assert_eq!(format_location("", "Berlin", " ", "DE"), "Berlin, DE");
        assert_eq!(format_location("", "", "", ""), "Unknown");
    }

    #[test]
    fn ipinfo_response_maps_missing_fields_to_unknown() {
        let resp: IpInfoResponse = serde_json::from_str(r#"{"ip":"203.0.113.7"}"#).unwrap();
        let geo = resp.into_geo();
        assert_eq!(geo.public_ip, "203.0.113.7");
        assert_eq!(geo.isp, "Unknown");
        assert_eq!(geo.location, "Unknown");
    }

    #[tokio::test]
    async fn unreachable_service_degrades_to_unknown() {
        let lookup = GeoLookup::new(
            "http://127.0.0.1:9/json".into(),
            "http://127.0.0.1:9/".into(),
            Duration::from_millis(200),
        )
        .unwrap();
        assert_eq!(lookup.lookup().await, GeoInfo::unknown());
    }
}
