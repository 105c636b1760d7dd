//! Key derivation from stream positions.
//!
//! A position in the xorshift stream is turned into key material in two
//! stages: the 32-bit stream value seeds a ChaCha20 generator, and the
//! first 32 bytes of that generator become an X25519 private key. The
//! offsets below partition one seed's stream into independent sub-streams
//! for the preshared key, the server key and the peer keys.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::WgPrngError;
use crate::stream::XorShift;

/// Seed used when none is given (the octal literal `01010101`).
pub const DEFAULT_SEED: u64 = 0o1010101;

/// Stream position of the preshared key shared by the server and every peer.
pub const PSK_OFFSET: u64 = 10;

/// Stream position of the server's private key.
pub const SERVER_OFFSET: u64 = 11;

/// Stream position of the first peer's private key. Peer `n` uses
/// `RNG_OFFSET + n - 1`.
pub const RNG_OFFSET: u64 = 100;

/// Length of a WireGuard key in bytes.
pub const KEY_LEN: usize = 32;

/// A 32-byte WireGuard key, displayed as standard padded base64.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Key(bytes)
    }

    /// Copies a key out of a slice, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WgPrngError> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            WgPrngError::derivation(format!(
                "expected {KEY_LEN} bytes of key material, got {}",
                bytes.len()
            ))
        })?;
        Ok(Key(bytes))
    }

    /// Raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Returns true for the all-zero key.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Treats this key as an X25519 private key and computes its public key.
    #[must_use]
    pub fn public_key(&self) -> Key {
        let secret = StaticSecret::from(self.0);
        Key(PublicKey::from(&secret).to_bytes())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD.encode(self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_string();
        write!(f, "Key({}…)", &encoded[..8])
    }
}

impl FromStr for Key {
    type Err = WgPrngError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| WgPrngError::format(format!("invalid base64 key: {e}")))?;
        Key::from_slice(&bytes)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A WireGuard private key together with its public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// The private key (unclamped; clamping happens inside X25519).
    pub private_key: Key,
    /// The public key matching `private_key`.
    pub public_key: Key,
}

impl KeyPair {
    /// Builds a key pair from 32 bytes of private key material.
    ///
    /// # Example
    ///
    /// ```
    /// use wgprng::KeyPair;
    ///
    /// let pair = KeyPair::from_bytes(&[7_u8; 32]).unwrap();
    /// assert_eq!(pair.public_key, pair.private_key.public_key());
    /// assert!(KeyPair::from_bytes(&[7_u8; 31]).is_err());
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WgPrngError> {
        let private_key = Key::from_slice(bytes)?;
        Ok(KeyPair {
            private_key,
            public_key: private_key.public_key(),
        })
    }
}

/// Returns the stream value at absolute position `offset` of `seed`'s stream.
#[must_use]
pub fn stream_value_at(seed: u64, offset: u64) -> u32 {
    let mut stream = XorShift::from_seed(seed);
    stream.skip(offset);
    stream.next()
}

/// Expands a stream value into 32 bytes of key material.
#[must_use]
pub fn key_bytes(stream_value: u32) -> [u8; KEY_LEN] {
    let mut rng = ChaCha20Rng::seed_from_u64(u64::from(stream_value));
    let mut bytes = [0_u8; KEY_LEN];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Derives the key pair at absolute position `offset` of `seed`'s stream.
///
/// Peers and servers both go through this (or through [`key_bytes`] with a
/// value taken from an advancing stream), so the two sides agree on every
/// key they share.
pub fn key_pair_at(seed: u64, offset: u64) -> Result<KeyPair, WgPrngError> {
    KeyPair::from_bytes(&key_bytes(stream_value_at(seed, offset)))
}

/// Derives the preshared key for `seed`.
pub fn preshared_key(seed: u64) -> Result<Key, WgPrngError> {
    Key::from_slice(&key_bytes(stream_value_at(seed, PSK_OFFSET)))
}

/// Derives the server key pair for `seed`.
///
/// Anyone holding the seed can compute the server's private key. The peer
/// side only uses the public half.
pub fn server_key_pair(seed: u64) -> Result<KeyPair, WgPrngError> {
    key_pair_at(seed, SERVER_OFFSET)
}

/// Derives the key pair of peer `ordinal` (1-based).
pub fn peer_key_pair(seed: u64, ordinal: u64) -> Result<KeyPair, WgPrngError> {
    if ordinal < 1 {
        return Err(WgPrngError::validation("n must be >= 1"));
    }
    let offset = RNG_OFFSET
        .checked_add(ordinal - 1)
        .ok_or_else(|| WgPrngError::validation(format!("ordinal {ordinal} is too large")))?;
    key_pair_at(seed, offset)
}

/// Parses a decimal seed.
///
/// ```
/// assert_eq!(wgprng::parse_seed("266305").unwrap(), wgprng::DEFAULT_SEED);
/// assert!(wgprng::parse_seed("-1").is_err());
/// ```
pub fn parse_seed(s: &str) -> Result<u64, WgPrngError> {
    s.trim()
        .parse()
        .map_err(|e| WgPrngError::validation(format!("invalid seed {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_default_seed_is_octal() {
        assert_eq!(DEFAULT_SEED, 266_305);
    }

    #[test]
    fn test_stream_values() {
        assert_eq!(stream_value_at(DEFAULT_SEED, PSK_OFFSET), 2_960_094_387);
        assert_eq!(stream_value_at(DEFAULT_SEED, SERVER_OFFSET), 2_178_805_666);
        assert_eq!(stream_value_at(DEFAULT_SEED, RNG_OFFSET), 376_530_471);
        assert_eq!(stream_value_at(2113, RNG_OFFSET), 3_934_965_641);
    }

    #[test]
    fn test_rfc7748_x25519_vector() {
        let private = decode_hex("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a");
        let public = decode_hex("8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a");

        let pair = KeyPair::from_bytes(&private).unwrap();
        assert_eq!(pair.private_key.as_bytes().as_slice(), private.as_slice());
        assert_eq!(pair.public_key.as_bytes().as_slice(), public.as_slice());
    }

    #[test]
    fn test_key_bytes_deterministic() {
        assert_eq!(key_bytes(376_530_471), key_bytes(376_530_471));
        assert_ne!(key_bytes(376_530_471), key_bytes(376_530_472));
    }

    #[test]
    fn test_known_keys_default_seed() {
        let psk = preshared_key(DEFAULT_SEED).unwrap();
        assert_eq!(
            psk.to_string(),
            "AdCX/OtxHE9Sxx+QKpEtrxtlqgklE78+4UXb+SyOODw="
        );

        let server = server_key_pair(DEFAULT_SEED).unwrap();
        assert_eq!(
            server.private_key.to_string(),
            "x8y51pmVXV0wRv4ptkGfvyB8S3moeWfpn8I/vcviFFM="
        );
        assert_eq!(
            server.public_key.to_string(),
            "B5b6T8KhHv2/vezlqRkEx/JN4fEsrBJd547frZgLnzg="
        );
    }

    #[test]
    fn test_peer_key_pair_rejects_zero_ordinal() {
        assert!(matches!(
            peer_key_pair(DEFAULT_SEED, 0),
            Err(WgPrngError::Validation { .. })
        ));
    }

    #[test]
    fn test_key_from_slice_wrong_length() {
        match Key::from_slice(&[0_u8; 16]) {
            Err(WgPrngError::Derivation { message }) => {
                assert_eq!(message, "expected 32 bytes of key material, got 16")
            }
            other => panic!("expected Derivation error, got {other:?}"),
        }
    }

    #[test]
    fn test_key_string_round_trip() {
        let encoded = "WujYBFWKMeCkFLUIiOIG3/OF4IwcH1YSJj68J3N8Blc=";
        let key: Key = encoded.parse().unwrap();
        assert_eq!(key.to_string(), encoded);
        assert_eq!(format!("{key:?}"), "Key(WujYBFWK…)");

        assert!(matches!(
            "not base64!".parse::<Key>(),
            Err(WgPrngError::Format { .. })
        ));
        assert!(matches!(
            "AAAA".parse::<Key>(),
            Err(WgPrngError::Derivation { .. })
        ));
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed("2113").unwrap(), 2113);
        assert_eq!(parse_seed(" 42 ").unwrap(), 42);
        assert!(matches!(
            parse_seed("01010101x"),
            Err(WgPrngError::Validation { .. })
        ));
    }
}
