//! Connectivity probe
//!
//! Answers one question: does the device currently hold a routable LAN address?

use local_ip_address::list_afinet_netifas;
use log::{debug, warn};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use std::net::IpAddr;
use trait_variant::make;

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait ConnectivityProbe {
    /// First routable local address, or `None` if there is none or the probe failed
    async fn current_lan_address(&self) -> Option<IpAddr>;
}

#[derive(Clone, Debug, Default)]
pub struct LocalAddressProbe {
    ignored_interfaces: Vec<String>,
}

impl LocalAddressProbe {
    /// `ignored_interfaces` lists interfaces whose addresses never count, e.g. the hotspot
    pub fn new(ignored_interfaces: Vec<String>) -> Self {
        Self { ignored_interfaces }
    }
}

impl ConnectivityProbe for LocalAddressProbe {
    async fn current_lan_address(&self) -> Option<IpAddr> {
        let interfaces = match list_afinet_netifas() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                warn!("failed to list network interfaces: {e}");
                return None;
            }
        };

        debug!("network interfaces: {interfaces:?}");

        first_routable(&interfaces, &self.ignored_interfaces)
    }
}

/// Pick the first routable IPv4 address, falling back to the first routable IPv6 address
pub fn first_routable(interfaces: &[(String, IpAddr)], ignored: &[String]) -> Option<IpAddr> {
    let candidates: Vec<IpAddr> = interfaces
        .iter()
        .filter(|(name, _)| !ignored.contains(name))
        .map(|(_, addr)| *addr)
        .filter(is_routable)
        .collect();

    candidates
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
}

fn is_routable(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => !(v4.is_loopback() || v4.is_unspecified() || v4.is_link_local()),
        // fe80::/10
        IpAddr::V6(v6) => {
            !(v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xffc0) == 0xfe80)
        }
    }
}
