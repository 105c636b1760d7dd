#![deny(trivial_casts, trivial_numeric_casts, unused_import_braces)]
//! # Deterministic WireGuard pools
//!
//! This library derives the key material and tunnel addresses of a WireGuard
//! server and its peers from a single `u64` seed. A server and any of its
//! peers can be generated independently, in different processes, and still
//! agree on every key they share.
//!
//! **The generated keys are predictable.** Anyone who knows the
//! seed can compute every private key, the server's included. The purpose
//! is probing whether WireGuard traffic reaches a server unharmed, not
//! protecting it.
//!
//! ## Derivation
//!
//! A 64-bit [`XorShift`] stream is started from the seed. Fixed stream
//! positions are reserved for each key:
//!
//! - [`PSK_OFFSET`] (10): the preshared key shared by everyone
//! - [`SERVER_OFFSET`] (11): the server's private key
//! - [`RNG_OFFSET`] + n - 1 (100, 101, ...): the private key of peer `n`
//!
//! The 32-bit value at a position seeds a ChaCha20 generator whose first 32
//! bytes become an X25519 private key.
//!
//! Peer `n` gets address index `n + 1` in the pool's CIDR (`10.8.0.0/24` by
//! default), so the first peer is `10.8.0.2` and `10.8.0.1` is left to the
//! server.
//!
//! ## Thread Safety
//!
//! [`Server`] is `Send` and `Sync`. [`Server::generate_config()`] can be
//! called from several threads; the pool is built exactly once.
//!
//! ## Quick Start
//!
//! ```rust
//! use wgprng::{Peer, Server, DEFAULT_SEED};
//!
//! fn main() -> Result<(), wgprng::WgPrngError> {
//!     let mut server = Server::from_seed(DEFAULT_SEED)?;
//!     server.set_public_address("0.0.0.0:51820")?;
//!     server.generate_config(10)?;
//!     println!("{}", server.serialize_config());
//!
//!     // Elsewhere, with nothing but the seed:
//!     let mut peer = Peer::from_seed_and_number(DEFAULT_SEED, 3)?;
//!     peer.set_endpoint("192.0.2.10:51820")?;
//!     assert_eq!(peer.key_pair.public_key, server.peers()[2].public_key);
//!     println!("{}", peer.serialize_config());
//!
//!     Ok(())
//! }
//! ```

mod derive;
mod error;
mod ipaddr;
mod once;
mod peer;
pub mod render;
mod server;
mod stream;

pub use derive::{
    key_bytes, key_pair_at, parse_seed, peer_key_pair, preshared_key, server_key_pair,
    stream_value_at, Key, KeyPair, DEFAULT_SEED, KEY_LEN, PSK_OFFSET, RNG_OFFSET, SERVER_OFFSET,
};
pub use error::WgPrngError;
pub use ipaddr::{address_count, host_network, nth_address, nth_address_in, parse_cidr};
pub use once::{OnceWithError, Outcome};
pub use peer::{Peer, DEFAULT_DNS};
pub use server::{
    parse_host_port, PeerConfig, Server, ServerConfig, ServerOptions, DEFAULT_CIDR,
    DEFAULT_EGRESS_INTERFACE, DEFAULT_INTERFACE, DEFAULT_LISTEN_ADDRESS, DEFAULT_LISTEN_PORT,
    DEFAULT_POOL_SIZE, DEFAULT_SERVER_ADDR,
};
pub use stream::XorShift;

pub use ipnetwork::Ipv4Network;
