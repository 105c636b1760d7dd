//! Server identity and its deterministic peer pool.

use ipnetwork::Ipv4Network;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::derive::{self, Key, KeyPair, RNG_OFFSET};
use crate::error::WgPrngError;
use crate::ipaddr;
use crate::once::{OnceWithError, Outcome};
use crate::render;
use crate::stream::XorShift;

/// Tunnel address of the server interface.
pub const DEFAULT_SERVER_ADDR: &str = "10.8.0.1/24";
/// Range peers are allocated from.
pub const DEFAULT_CIDR: &str = "10.8.0.0/24";
/// WireGuard interface name.
pub const DEFAULT_INTERFACE: &str = "wg0";
/// Interface NAT'd traffic leaves through.
pub const DEFAULT_EGRESS_INTERFACE: &str = "eth0";
/// UDP port the server listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 51820;
/// Address the demo server binds when none is given.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:51820";
/// Pool size used when none is given.
pub const DEFAULT_POOL_SIZE: u64 = 10;

/// Splits a `host:port` string.
///
/// Exactly one `:` is accepted (so no bare IPv6 literals) and the port must
/// be a decimal `u16`.
///
/// ```
/// let (host, port) = wgprng::parse_host_port("0.0.0.0:51820").unwrap();
/// assert_eq!((host, port), ("0.0.0.0", 51820));
/// assert!(wgprng::parse_host_port("0.0.0.0").is_err());
/// ```
pub fn parse_host_port(addr: &str) -> Result<(&str, u16), WgPrngError> {
    let mut parts = addr.split(':');
    let (host, port) = match (parts.next(), parts.next(), parts.next()) {
        (Some(host), Some(port), None) => (host, port),
        _ => {
            return Err(WgPrngError::format(format!(
                "expected ip:port format, got {addr:?}"
            )))
        }
    };
    let port = port
        .parse()
        .map_err(|e| WgPrngError::format(format!("invalid port {port:?}: {e}")))?;
    Ok((host, port))
}

/// Network settings of a [`Server`].
///
/// # Example
///
/// ```
/// use wgprng::{Server, ServerOptions};
///
/// let opts = ServerOptions::default()
///     .cidr("172.16.0.0/16")
///     .address("172.16.0.1/16")
///     .egress_interface("ens3");
/// let server = Server::with_options(2113, opts).unwrap();
/// assert_eq!(server.cidr.to_string(), "172.16.0.0/16");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    cidr: String,
    address: String,
    interface: String,
    egress_interface: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            cidr: DEFAULT_CIDR.to_owned(),
            address: DEFAULT_SERVER_ADDR.to_owned(),
            interface: DEFAULT_INTERFACE.to_owned(),
            egress_interface: DEFAULT_EGRESS_INTERFACE.to_owned(),
        }
    }
}

impl ServerOptions {
    /// Range peer addresses are allocated from. The server conventionally
    /// takes index 1 and peers start at index 2.
    #[must_use]
    pub fn cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr = cidr.into();
        self
    }

    /// Address of the server's tunnel interface, with prefix.
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Name of the WireGuard interface.
    #[must_use]
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Interface used for NAT in the firewall rules.
    #[must_use]
    pub fn egress_interface(mut self, egress_interface: impl Into<String>) -> Self {
        self.egress_interface = egress_interface.into();
        self
    }
}

/// The server's view of one peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Public key of the peer.
    pub public_key: Key,
    /// The peer's tunnel address as a `/32`.
    pub allowed_ip: Ipv4Network,
}

/// Snapshot of a server's settings and pool, ready for rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub private_key: Key,
    pub address: Ipv4Network,
    pub listen_port: u16,
    pub interface: String,
    pub egress_interface: String,
    pub cidr: Ipv4Network,
    pub peers: Vec<PeerConfig>,
}

/// Server-side representation of the pool of peers for one WireGuard
/// interface.
///
/// The pool is filled by [`generate_config()`](Server::generate_config),
/// which does its work once per `Server`; further calls only report the
/// first call's result.
#[derive(Debug)]
pub struct Server {
    /// Server key pair.
    pub key_pair: KeyPair,
    /// Preshared key shared with every peer.
    pub preshared_key: Key,
    /// Tunnel address of the server interface.
    pub address: Ipv4Network,
    /// Range peers are allocated from.
    pub cidr: Ipv4Network,
    /// WireGuard interface name.
    pub interface: String,
    /// Interface used for NAT.
    pub egress_interface: String,
    /// Public `host:port`, if one was set.
    pub public_address: Option<String>,
    /// UDP listen port.
    pub listen_port: u16,
    xorshift: XorShift,
    pool: OnceWithError<Vec<PeerConfig>>,
}

impl Server {
    /// Derives a server with default network settings from `seed`.
    ///
    /// # Example
    ///
    /// ```
    /// use wgprng::{Server, DEFAULT_SEED};
    ///
    /// let server = Server::from_seed(DEFAULT_SEED).unwrap();
    /// server.generate_config(3).unwrap();
    /// assert_eq!(server.peers().len(), 3);
    /// assert_eq!(server.peers()[0].allowed_ip.to_string(), "10.8.0.2/32");
    /// ```
    pub fn from_seed(seed: u64) -> Result<Server, WgPrngError> {
        Server::with_options(seed, ServerOptions::default())
    }

    /// Derives a server from `seed` with the given network settings.
    pub fn with_options(seed: u64, options: ServerOptions) -> Result<Server, WgPrngError> {
        let cidr = ipaddr::parse_cidr(&options.cidr)?;
        let address = ipaddr::parse_cidr(&options.address)?;

        let preshared_key = derive::preshared_key(seed)?;
        let key_pair = derive::server_key_pair(seed)?;

        debug!("derived server {} for cidr {cidr}", key_pair.public_key);

        Ok(Server {
            key_pair,
            preshared_key,
            address,
            cidr,
            interface: options.interface,
            egress_interface: options.egress_interface,
            public_address: None,
            listen_port: DEFAULT_LISTEN_PORT,
            xorshift: XorShift::from_seed(seed),
            pool: OnceWithError::new(),
        })
    }

    /// Sets the public `host:port` and takes the listen port from it.
    pub fn set_public_address(&mut self, addr: &str) -> Result<(), WgPrngError> {
        let (_, port) = parse_host_port(addr)?;
        self.public_address = Some(addr.to_owned());
        self.listen_port = port;
        Ok(())
    }

    /// Sets the interface used for NAT.
    pub fn set_egress_interface(&mut self, iface: impl Into<String>) {
        self.egress_interface = iface.into();
    }

    /// Fills the pool with `max` peers.
    ///
    /// Only the first call does any work. Later calls, with any `max`,
    /// return the first call's result. If a peer cannot be derived or
    /// allocated, generation stops there: the error is returned and the
    /// peers built before it stay in [`peers()`](Self::peers).
    ///
    /// Peer `i` (0-based) gets the key at stream position `RNG_OFFSET + i`
    /// and CIDR index `i + 2`, the same values
    /// [`Peer::from_seed_and_number`](crate::Peer::from_seed_and_number)
    /// uses for ordinal `i + 1`.
    pub fn generate_config(&self, max: u64) -> Result<(), WgPrngError> {
        self.pool
            .call_once(|| self.build_pool(max))
            .result()
    }

    fn build_pool(&self, max: u64) -> Outcome<Vec<PeerConfig>> {
        debug!("generating pool of {max} peers in {}", self.cidr);

        let mut stream = self.xorshift;
        stream.skip(RNG_OFFSET);

        let capacity = usize::try_from(max.min(ipaddr::address_count(&self.cidr))).unwrap_or(0);
        let mut peers = Vec::with_capacity(capacity);

        for _ in 0..max {
            match next_peer(&mut stream, &self.cidr, peers.len()) {
                Ok(peer) => peers.push(peer),
                Err(err) => {
                    warn!(
                        "pool generation stopped after {} of {max} peers: {err}",
                        peers.len()
                    );
                    return Outcome {
                        value: peers,
                        error: Some(err),
                    };
                }
            }
        }

        debug!("generated {} peers", peers.len());
        Outcome {
            value: peers,
            error: None,
        }
    }

    /// Peers generated so far. Empty until
    /// [`generate_config()`](Self::generate_config) has run.
    pub fn peers(&self) -> &[PeerConfig] {
        self.pool
            .get()
            .map(|outcome| outcome.value.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the pool has been generated (successfully or not).
    pub fn is_generated(&self) -> bool {
        self.pool.is_done()
    }

    /// Snapshot of the server settings and current pool.
    #[must_use]
    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            private_key: self.key_pair.private_key,
            address: self.address,
            listen_port: self.listen_port,
            interface: self.interface.clone(),
            egress_interface: self.egress_interface.clone(),
            cidr: self.cidr,
            peers: self.peers().to_vec(),
        }
    }

    /// Renders the server's `wg-quick` config.
    #[must_use]
    pub fn serialize_config(&self) -> String {
        render::server_config(&self.config())
    }
}

fn next_peer(
    stream: &mut XorShift,
    cidr: &Ipv4Network,
    count: usize,
) -> Result<PeerConfig, WgPrngError> {
    let key_pair = KeyPair::from_bytes(&derive::key_bytes(stream.next()))?;

    // TODO: the last address of the range is the broadcast address and
    // should not be handed out.
    let index = i64::try_from(count + 2)
        .map_err(|_| WgPrngError::validation(format!("pool index {count} is too large")))?;
    let ip = ipaddr::nth_address_in(cidr, index)?;

    Ok(PeerConfig {
        public_key: key_pair.public_key,
        allowed_ip: ipaddr::host_network(ip)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use crate::DEFAULT_SEED;

    #[test]
    fn test_generate_config() {
        let _ = env_logger::try_init();

        let server = Server::from_seed(DEFAULT_SEED).unwrap();
        let max = 100;
        server.generate_config(max).unwrap();

        assert_eq!(server.peers().len() as u64, max);

        let mut public_keys = HashSet::new();
        for peer in server.peers() {
            assert!(!peer.public_key.is_zero(), "zero public key");
            assert!(
                public_keys.insert(peer.public_key),
                "public key {} already in list",
                peer.public_key
            );
        }
    }

    #[test]
    fn test_addresses_increase() {
        let server = Server::from_seed(2113).unwrap();
        server.generate_config(50).unwrap();

        let addrs: Vec<u32> = server
            .peers()
            .iter()
            .map(|p| {
                assert_eq!(p.allowed_ip.prefix(), 32);
                u32::from(p.allowed_ip.ip())
            })
            .collect();
        assert_eq!(addrs[0], u32::from(std::net::Ipv4Addr::new(10, 8, 0, 2)));
        assert!(addrs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_generate_config_is_idempotent() {
        let server = Server::from_seed(DEFAULT_SEED).unwrap();
        assert!(!server.is_generated());
        assert!(server.peers().is_empty());

        server.generate_config(5).unwrap();
        let first = server.peers().to_vec();

        server.generate_config(20).unwrap();
        assert_eq!(server.peers(), first.as_slice());
        assert_eq!(server.peers().len(), 5);
    }

    #[test]
    fn test_partial_failure_keeps_peers() {
        let _ = env_logger::try_init();

        let opts = ServerOptions::default().cidr("10.8.0.0/29");
        let server = Server::with_options(DEFAULT_SEED, opts).unwrap();

        // A /29 has indices 0..8; peers use 2..8, so six fit.
        let err = server.generate_config(10).unwrap_err();
        assert_eq!(err, WgPrngError::range(8, 8));
        assert_eq!(server.peers().len(), 6);
        assert_eq!(server.peers()[5].allowed_ip.to_string(), "10.8.0.7/32");

        // The stored error is reported again without rerunning.
        assert_eq!(server.generate_config(1), Err(WgPrngError::range(8, 8)));
        assert_eq!(server.peers().len(), 6);
    }

    #[test]
    fn test_concurrent_generate_config() {
        let server = Arc::new(Server::from_seed(DEFAULT_SEED).unwrap());

        let handles: Vec<_> = (1..=8_u64)
            .map(|i| {
                let server = Arc::clone(&server);
                thread::spawn(move || server.generate_config(i * 10))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let len = server.peers().len();
        assert!(len % 10 == 0 && (10..=80).contains(&len));
        let keys: HashSet<_> = server.peers().iter().map(|p| p.public_key).collect();
        assert_eq!(keys.len(), len);
    }

    #[test]
    fn test_set_public_address() {
        let mut server = Server::from_seed(DEFAULT_SEED).unwrap();
        assert_eq!(server.listen_port, DEFAULT_LISTEN_PORT);

        server.set_public_address("198.51.100.4:443").unwrap();
        assert_eq!(server.listen_port, 443);
        assert_eq!(server.public_address.as_deref(), Some("198.51.100.4:443"));

        for bad in ["198.51.100.4", "198.51.100.4:", "a:b:c", "host:port", "h:70000"] {
            assert!(
                matches!(server.set_public_address(bad), Err(WgPrngError::Format { .. })),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(server.listen_port, 443);
    }

    #[test]
    fn test_with_options_bad_cidr() {
        let opts = ServerOptions::default().cidr("fd00::/64");
        assert!(matches!(
            Server::with_options(DEFAULT_SEED, opts),
            Err(WgPrngError::Format { .. })
        ));
    }

    #[test]
    fn test_server_keys() {
        let server = Server::from_seed(DEFAULT_SEED).unwrap();
        assert_eq!(
            server.key_pair.public_key.to_string(),
            "B5b6T8KhHv2/vezlqRkEx/JN4fEsrBJd547frZgLnzg="
        );
        assert_eq!(server.preshared_key, derive::preshared_key(DEFAULT_SEED).unwrap());
        assert_eq!(server.address.to_string(), "10.8.0.1/24");
    }
}
