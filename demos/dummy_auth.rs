use rand::Rng;
use wgprng::{
    parse_host_port, parse_seed, Peer, Server, DEFAULT_EGRESS_INTERFACE, DEFAULT_LISTEN_ADDRESS,
    DEFAULT_POOL_SIZE, DEFAULT_SEED,
};

const USAGE: &str = "usage: dummy_auth server|peer [--address host:port] [--iface name] \
                     [--seed n] [--peers n]";

enum Mode {
    Server,
    Peer,
}

struct Config {
    mode: Mode,
    address: String,
    iface: String,
    seed: u64,
    peers: u64,
}

fn parse_args() -> Result<Config, Box<dyn std::error::Error>> {
    let mut mode = None;
    let mut address = DEFAULT_LISTEN_ADDRESS.to_owned();
    let mut iface = DEFAULT_EGRESS_INTERFACE.to_owned();
    let mut seed = DEFAULT_SEED;
    let mut peers = DEFAULT_POOL_SIZE;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "server" => mode = Some(Mode::Server),
            "peer" => mode = Some(Mode::Peer),
            "--address" | "--iface" | "--seed" | "--peers" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("{arg} expects a value\n{USAGE}"))?;
                match arg.as_str() {
                    "--address" => address = value,
                    "--iface" => iface = value,
                    "--seed" => seed = parse_seed(&value)?,
                    _ => {
                        peers = value
                            .parse()
                            .map_err(|e| format!("invalid --peers {value:?}: {e}"))?
                    }
                }
            }
            _ => return Err(format!("unexpected argument {arg:?}\n{USAGE}").into()),
        }
    }

    let mode = mode.ok_or_else(|| format!("expected either 'server' or 'peer'\n{USAGE}"))?;
    if peers < 1 {
        return Err("--peers must be at least 1".into());
    }
    // Reject a bad address before deriving anything.
    parse_host_port(&address)?;

    Ok(Config {
        mode,
        address,
        iface,
        seed,
        peers,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cfg = parse_args()?;
    match cfg.mode {
        Mode::Server => {
            let mut server = Server::from_seed(cfg.seed)?;
            server.set_public_address(&cfg.address)?;
            server.set_egress_interface(cfg.iface);
            server.generate_config(cfg.peers)?;
            println!("{}", server.serialize_config());
        }
        Mode::Peer => {
            let n = rand::thread_rng().gen_range(1..=cfg.peers);
            let mut peer = Peer::from_seed_and_number(cfg.seed, n)?;
            peer.set_endpoint(&cfg.address)?;
            println!("{}", peer.serialize_config());
        }
    }
    Ok(())
}
