//! Peer-side identity derived from a seed and an ordinal.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::derive::{self, Key, KeyPair};
use crate::error::WgPrngError;
use crate::ipaddr;
use crate::render;
use crate::server::{parse_host_port, DEFAULT_CIDR};

/// Resolvers written into every peer config.
pub const DEFAULT_DNS: &str = "1.1.1.1, 1.0.0.1";

/// Everything a peer needs to connect to the server derived from the same
/// seed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Position of this peer in the pool, starting at 1.
    pub ordinal: u64,
    /// Tunnel address of this peer (a `/32`).
    pub address: Ipv4Addr,
    /// This peer's key pair.
    pub key_pair: KeyPair,
    /// Preshared key shared by the server and all of its peers.
    pub preshared_key: Key,
    /// Public key of the server.
    pub server_public_key: Key,
    /// Resolvers for the tunnel.
    pub dns: String,
    /// Server endpoint as `host:port`. Not derived; set by the caller.
    pub endpoint: Option<String>,
}

impl Peer {
    /// Derives peer number `ordinal` (1-based) of `seed` in the default CIDR
    /// `10.8.0.0/24`.
    ///
    /// The first peer gets `10.8.0.2`; `.0` is the network and `.1` the
    /// server.
    ///
    /// # Example
    ///
    /// ```
    /// use std::net::Ipv4Addr;
    /// use wgprng::{Peer, DEFAULT_SEED};
    ///
    /// let peer = Peer::from_seed_and_number(DEFAULT_SEED, 1).unwrap();
    /// assert_eq!(peer.address, Ipv4Addr::new(10, 8, 0, 2));
    /// assert!(Peer::from_seed_and_number(DEFAULT_SEED, 0).is_err());
    /// ```
    pub fn from_seed_and_number(seed: u64, ordinal: u64) -> Result<Peer, WgPrngError> {
        let cidr = ipaddr::parse_cidr(DEFAULT_CIDR)?;
        Peer::with_cidr(seed, ordinal, &cidr)
    }

    /// Derives peer number `ordinal` of `seed`, allocating its address in
    /// `cidr`.
    pub fn with_cidr(seed: u64, ordinal: u64, cidr: &Ipv4Network) -> Result<Peer, WgPrngError> {
        if ordinal < 1 {
            return Err(WgPrngError::validation("n must be >= 1"));
        }

        let preshared_key = derive::preshared_key(seed)?;

        let index = ordinal
            .checked_add(1)
            .and_then(|i| i64::try_from(i).ok())
            .ok_or_else(|| WgPrngError::validation(format!("ordinal {ordinal} is too large")))?;
        let address = ipaddr::nth_address_in(cidr, index)?;

        let key_pair = derive::peer_key_pair(seed, ordinal)?;
        let server_public_key = derive::server_key_pair(seed)?.public_key;

        debug!("derived peer {ordinal} at {address}");

        Ok(Peer {
            ordinal,
            address,
            key_pair,
            preshared_key,
            server_public_key,
            dns: DEFAULT_DNS.to_owned(),
            endpoint: None,
        })
    }

    /// Sets the server endpoint after checking it is a valid `host:port`.
    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<(), WgPrngError> {
        parse_host_port(endpoint)?;
        self.endpoint = Some(endpoint.to_owned());
        Ok(())
    }

    /// The key pair generated for this peer.
    #[must_use]
    pub fn key_pair(&self) -> KeyPair {
        self.key_pair
    }

    /// Renders this peer's `wg-quick` config.
    #[must_use]
    pub fn serialize_config(&self) -> String {
        render::peer_config(self)
    }
}
