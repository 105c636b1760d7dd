//! `wg-quick` config rendering.

use std::fmt::Write;

use crate::peer::Peer;
use crate::server::ServerConfig;

/// Routes sent through the tunnel by every peer.
pub const PEER_ALLOWED_IPS: &str = "0.0.0.0/0, ::/0";

/// Keepalive interval written into every peer config, in seconds.
pub const PERSISTENT_KEEPALIVE: u16 = 25;

/// Renders the server side: the interface, NAT and forwarding rules, and one
/// `[Peer]` section per pool entry.
pub fn server_config(config: &ServerConfig) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_server_config(&mut out, config);
    out
}

/// Renders a peer config pointing at the server the peer was derived for.
pub fn peer_config(peer: &Peer) -> String {
    let mut out = String::new();
    let _ = write_peer_config(&mut out, peer);
    out
}

fn write_server_config(out: &mut String, config: &ServerConfig) -> std::fmt::Result {
    writeln!(out, "[Interface]")?;
    writeln!(out, "PrivateKey = {}", config.private_key)?;
    writeln!(out, "Address = {}", config.address)?;
    writeln!(out, "ListenPort = {}", config.listen_port)?;
    writeln!(
        out,
        "PostUp = iptables -t nat -A POSTROUTING -s {cidr} -o {egress} -j MASQUERADE; \
         iptables -A INPUT -p udp -m udp --dport {port} -j ACCEPT; \
         iptables -A FORWARD -i {iface} -j ACCEPT; \
         iptables -A FORWARD -o {iface} -j ACCEPT;",
        cidr = config.cidr,
        egress = config.egress_interface,
        port = config.listen_port,
        iface = config.interface,
    )?;

    for peer in &config.peers {
        writeln!(out)?;
        writeln!(out, "[Peer]")?;
        writeln!(out, "PublicKey = {}", peer.public_key)?;
        writeln!(out, "AllowedIPs = {}", peer.allowed_ip)?;
    }
    Ok(())
}

fn write_peer_config(out: &mut String, peer: &Peer) -> std::fmt::Result {
    writeln!(out, "[Interface]")?;
    writeln!(out, "Address = {}/32", peer.address)?;
    writeln!(out, "DNS = {}", peer.dns)?;
    writeln!(out, "PrivateKey = {}", peer.key_pair.private_key)?;
    writeln!(out)?;
    writeln!(out, "[Peer]")?;
    if let Some(endpoint) = &peer.endpoint {
        writeln!(out, "Endpoint = {endpoint}")?;
    }
    writeln!(out, "PublicKey = {}", peer.server_public_key)?;
    writeln!(out, "PresharedKey = {}", peer.preshared_key)?;
    writeln!(out, "AllowedIPs = {PEER_ALLOWED_IPS}")?;
    writeln!(out, "PersistentKeepalive = {PERSISTENT_KEEPALIVE}")?;
    Ok(())
}
