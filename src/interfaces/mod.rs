// Interface enumeration, active filtering and primary selection.

mod linux;

use crate::error::MonitorError;
use crate::models::{Counters, Interface};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use sysinfo::Networks;
use tracing::{debug, instrument};

/// Name prefixes conventionally used for wired and wireless adapters.
const CONVENTIONAL_PREFIXES: [&str; 6] = ["eth", "en", "wlan", "wl", "ethernet", "wi-fi"];

/// OS adapter behind the registry. Swapped for a stub in tests.
pub trait InterfaceSource: Send {
    /// Every interface the host reports, including loopback and down ones.
    fn enumerate(&mut self) -> Vec<Interface>;
    /// Current cumulative counters keyed by interface name.
    fn counters(&mut self) -> HashMap<String, Counters>;
}

/// Which active interfaces get a sample each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceScope {
    Primary,
    #[default]
    All,
}

pub struct SysinfoInterfaces {
    networks: Networks,
}

impl Default for SysinfoInterfaces {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoInterfaces {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl InterfaceSource for SysinfoInterfaces {
    fn enumerate(&mut self) -> Vec<Interface> {
        self.networks.refresh(true);
        self.networks
            .list()
            .iter()
            .map(|(name, data)| {
                let addrs: Vec<IpAddr> = data.ip_networks().iter().map(|n| n.addr).collect();
                let is_loopback = is_loopback_name(name)
                    || (!addrs.is_empty() && addrs.iter().all(|a| a.is_loopback()));
                Interface {
                    name: name.clone(),
                    address: preferred_address(&addrs),
                    is_up: linux::read_operstate(name).unwrap_or(!addrs.is_empty()),
                    is_loopback,
                    link_speed: linux::get_interface_speed(name),
                }
            })
            .collect()
    }

    fn counters(&mut self) -> HashMap<String, Counters> {
        self.networks.refresh(true);
        self.networks
            .list()
            .iter()
            .map(|(name, data)| {
                (
                    name.clone(),
                    Counters {
                        bytes_sent: data.total_transmitted(),
                        bytes_recv: data.total_received(),
                        packets_sent: data.total_packets_transmitted(),
                        packets_recv: data.total_packets_received(),
                    },
                )
            })
            .collect()
    }
}

fn is_loopback_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "lo" || lower.starts_with("lo0") || lower.contains("loopback")
}

/// First usable IPv4, else first non-loopback address, else anything.
fn preferred_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|a| is_valid_ipv4(a))
        .or_else(|| addrs.iter().find(|a| !a.is_loopback()))
        .or_else(|| addrs.first())
        .copied()
}

fn is_valid_ipv4(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_link_local() && !v4.is_unspecified(),
        IpAddr::V6(_) => false,
    }
}

/// Up, not loopback, and carrying an address.
pub fn is_active(iface: &Interface) -> bool {
    iface.is_up && !iface.is_loopback && iface.address.is_some()
}

/// Index of the preferred interface among `active`.
pub fn select_primary(active: &[Interface]) -> Option<usize> {
    active
        .iter()
        .position(|i| i.address.as_ref().is_some_and(is_valid_ipv4))
        .or_else(|| {
            active.iter().position(|i| {
                let lower = i.name.to_ascii_lowercase();
                CONVENTIONAL_PREFIXES.iter().any(|p| lower.starts_with(p))
            })
        })
        .or(if active.is_empty() { None } else { Some(0) })
}

/// Cached view of active interfaces; re-enumerated when stale.
pub struct InterfaceRegistry {
    source: Box<dyn InterfaceSource>,
    active: Vec<Interface>,
    primary: Option<usize>,
    refreshed_at: Option<Instant>,
    refresh_every: Duration,
}

impl InterfaceRegistry {
    pub fn new(source: Box<dyn InterfaceSource>, refresh_every: Duration) -> Self {
        Self {
            source,
            active: Vec::new(),
            primary: None,
            refreshed_at: None,
            refresh_every,
        }
    }

    #[instrument(skip(self), fields(operation = "refresh_interfaces"))]
    pub fn refresh(&mut self) -> &[Interface] {
        let all = self.source.enumerate();
        let total = all.len();
        self.active = all.into_iter().filter(is_active).collect();
        // Stable order so "first active" does not depend on hash iteration.
        self.active.sort_by(|a, b| a.name.cmp(&b.name));
        self.primary = select_primary(&self.active);
        self.refreshed_at = Some(Instant::now());
        debug!(
            total,
            active = self.active.len(),
            primary = self.primary.map(|i| self.active[i].name.as_str()),
            "interfaces refreshed"
        );
        &self.active
    }

    pub fn active(&self) -> &[Interface] {
        &self.active
    }

    /// `NotFound` means "no network sample this tick", never a fatal condition.
    pub fn primary(&self) -> Result<&Interface, MonitorError> {
        self.primary
            .and_then(|i| self.active.get(i))
            .ok_or(MonitorError::NotFound)
    }

    pub fn is_stale(&self) -> bool {
        self.refreshed_at
            .is_none_or(|t| t.elapsed() >= self.refresh_every)
    }

    pub fn mark_stale(&mut self) {
        self.refreshed_at = None;
    }

    pub fn counters(&mut self) -> HashMap<String, Counters> {
        self.source.counters()
    }

    /// Interfaces to sample under `scope`; empty when none are active.
    pub fn monitored(&self, scope: InterfaceScope) -> Vec<Interface> {
        match scope {
            InterfaceScope::All => self.active.clone(),
            InterfaceScope::Primary => self.primary().map(|i| vec![i.clone()]).unwrap_or_default(),
        }
    }
}
