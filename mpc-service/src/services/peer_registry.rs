//! Discovery of the other validators participating in the signal-
//! availability network.
//!
//! A production deployment resolves peer addresses from an on-chain
//! validator set (a metagraph); this module only specifies the trait that
//! abstraction implements and an SSRF-guarding address validator that any
//! implementation must run addresses through before they are ever dialed.

use std::net::IpAddr;

use crate::error::CoordinatorError;
use crate::services::peer_client::PeerHandle;

/// Resolves the set of peers participating in a session.
pub trait PeerRegistry: Send + Sync {
    /// Every known peer other than this node, in no particular order.
    fn peers(&self) -> Vec<PeerHandle>;
}

/// A fixed, operator-configured peer set. Addresses are validated once at
/// construction time.
#[derive(Debug, Clone)]
pub struct StaticPeerRegistry {
    peers: Vec<PeerHandle>,
}

impl StaticPeerRegistry {
    /// Builds a registry from `(address, x)` pairs, rejecting any address
    /// that resolves to a non-routable destination.
    pub fn new(entries: Vec<(String, u8)>) -> Result<Self, CoordinatorError> {
        let mut peers = Vec::with_capacity(entries.len());
        for (address, x) in entries {
            validate_peer_address(&address)?;
            peers.push(PeerHandle { address, x });
        }
        Ok(Self { peers })
    }
}

impl PeerRegistry for StaticPeerRegistry {
    fn peers(&self) -> Vec<PeerHandle> {
        self.peers.clone()
    }
}

/// Requires `https` and rejects a peer address whose host is itself a
/// literal loopback, link-local, or private (RFC 1918 / unique-local) IP
/// address.
///
/// This check only inspects literal IP hosts - it does not resolve a
/// hostname's DNS records, so a hostname that currently resolves (or is
/// later re-pointed, e.g. via DNS rebinding) to a disallowed range is not
/// caught here. Callers that source peer addresses from anything an
/// untrusted party could influence (e.g. an on-chain registry) must keep
/// hostnames out of that source entirely, or resolve and re-check the
/// resolved address immediately before every dial rather than relying on
/// this one-time construction-time check.
///
/// A peer address under attacker influence must never be able to redirect
/// this node's outbound session traffic at internal services - this is the
/// node's one SSRF choke point, and every address-resolving `PeerRegistry`
/// implementation must route through it before a peer is ever dialed.
pub fn validate_peer_address(address: &str) -> Result<(), CoordinatorError> {
    let url = reqwest::Url::parse(address)
        .map_err(|err| CoordinatorError::InvalidInput(format!("invalid peer address `{address}`: {err}")))?;

    if url.scheme() != "https" {
        return Err(CoordinatorError::InvalidInput(format!("peer address `{address}` must use https")));
    }

    let host = url
        .host_str()
        .ok_or_else(|| CoordinatorError::InvalidInput(format!("peer address `{address}` has no host")))?;

    if host.eq_ignore_ascii_case("localhost") || host.ends_with(".local") {
        return Err(CoordinatorError::InvalidInput(format!("peer address `{address}` targets a local host")));
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_disallowed_ip(ip) {
            return Err(CoordinatorError::InvalidInput(format!(
                "peer address `{address}` resolves to a non-routable IP"
            )));
        }
    }

    Ok(())
}

fn is_disallowed_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_link_local() || v4.is_private() || v4.is_unspecified() || v4.is_multicast(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // link local fe80::/10
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_loopback_and_private_ranges() {
        assert!(validate_peer_address("https://127.0.0.1:8080").is_err());
        assert!(validate_peer_address("https://10.0.0.5").is_err());
        assert!(validate_peer_address("https://192.168.1.5").is_err());
        assert!(validate_peer_address("https://169.254.1.1").is_err());
        assert!(validate_peer_address("https://localhost").is_err());
    }

    #[test]
    fn rejects_non_https() {
        assert!(validate_peer_address("http://validator.example.net").is_err());
    }

    #[test]
    fn accepts_https_hostname_without_resolving_it() {
        assert!(validate_peer_address("https://validator-3.example.net").is_ok());
    }

    #[test]
    fn does_not_resolve_hostnames_that_could_point_at_disallowed_ranges() {
        // Documented limitation: only a literal IP host is checked against
        // `is_disallowed_ip`. A hostname is accepted even if an operator
        // recognizes it as pointing somewhere internal, since resolving it
        // here would just be checking a snapshot a rebinding attack could
        // change by the time the peer is actually dialed.
        assert!(validate_peer_address("https://internal-only.example.net").is_ok());
    }
}
