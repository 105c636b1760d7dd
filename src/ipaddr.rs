//! IPv4 address allocation inside a CIDR block.

use std::net::Ipv4Addr;

use ipnetwork::{IpNetwork, Ipv4Network};

use crate::error::WgPrngError;

/// Parses an IPv4 CIDR such as `10.8.0.0/24`.
///
/// The prefix length is mandatory and IPv6 networks are rejected. Host bits
/// are kept as written; use [`Ipv4Network::network()`] for the base address.
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Network, WgPrngError> {
    if !cidr.contains('/') {
        return Err(WgPrngError::format(format!(
            "invalid CIDR range {cidr:?}: missing prefix length"
        )));
    }
    match cidr.parse::<IpNetwork>()? {
        IpNetwork::V4(net) => Ok(net),
        IpNetwork::V6(_) => Err(WgPrngError::format(
            "only IPv4 addresses are supported",
        )),
    }
}

/// Number of addresses in `net`, network and broadcast included.
#[must_use]
pub fn address_count(net: &Ipv4Network) -> u64 {
    1_u64 << (32 - u32::from(net.prefix()))
}

/// Returns the `n`th address of the CIDR range `cidr`.
///
/// Index 0 is the network address itself. There is no wraparound: an index
/// at or past the number of addresses in the range is a
/// [`Range`](WgPrngError::Range) error.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
///
/// let ip = wgprng::nth_address("192.168.0.0/24", 10).unwrap();
/// assert_eq!(ip, Ipv4Addr::new(192, 168, 0, 10));
/// assert!(wgprng::nth_address("192.168.0.0/24", 256).is_err());
/// ```
pub fn nth_address(cidr: &str, n: i64) -> Result<Ipv4Addr, WgPrngError> {
    let net = parse_cidr(cidr)?;
    nth_address_in(&net, n)
}

/// Like [`nth_address`], for an already parsed network.
pub fn nth_address_in(net: &Ipv4Network, n: i64) -> Result<Ipv4Addr, WgPrngError> {
    let size = address_count(net);
    let index = match u64::try_from(n) {
        Ok(index) if index < size => index,
        _ => return Err(WgPrngError::range(n, size)),
    };

    let base = u32::from(net.network());
    // index < 2^(32 - prefix) and base has its host bits cleared, so this
    // stays within the network.
    Ok(Ipv4Addr::from(base + index as u32))
}

/// Wraps a single host address as a `/32` network.
pub fn host_network(addr: Ipv4Addr) -> Result<Ipv4Network, WgPrngError> {
    Ok(Ipv4Network::new(addr, 32)?)
}
