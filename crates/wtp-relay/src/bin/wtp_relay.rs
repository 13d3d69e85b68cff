//! # WTP Relay
//!
//! Forwards between a WTP sender and receiver, corrupting sender payloads
//! with a given probability. Runs until killed.
//!
//! ```bash
//! wtp-relay --src-ip 10.0.0.1 --dst-ip 10.0.0.2 --dst-port 2333 \
//!   --port 5005 --corrupt 0.02
//! ```

use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;
use wtp_relay::{Relay, RelayConfig};

#[derive(Parser, Debug)]
#[command(name = "wtp-relay", about = "Corrupting UDP relay between a WTP sender and receiver")]
struct Cli {
    /// Address to bind; 0.0.0.0 for all interfaces.
    #[arg(long, default_value = "0.0.0.0")]
    bind_address: IpAddr,

    /// Port to listen on.
    #[arg(long, default_value_t = 5001)]
    port: u16,

    /// Sender host IP.
    #[arg(long, default_value = "10.0.0.1")]
    src_ip: IpAddr,

    /// Receiver host IP.
    #[arg(long, default_value = "10.0.0.2")]
    dst_ip: IpAddr,

    /// Receiver port.
    #[arg(long)]
    dst_port: u16,

    /// Probability of corrupting a sender datagram, e.g. 0.01 for 1%.
    #[arg(long, value_parser = parse_probability)]
    corrupt: Option<f64>,

    /// Seed for the corruption RNG. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=1.0).contains(&p) {
        return Err(format!("{p} is not a probability in [0, 1]"));
    }
    Ok(p)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Usage errors exit 1; --help and --version keep clap's behaviour.
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let seed = cli.seed.unwrap_or_else(rand::random);
    let config = RelayConfig {
        bind: SocketAddr::new(cli.bind_address, cli.port),
        sender_ip: cli.src_ip,
        receiver: SocketAddr::new(cli.dst_ip, cli.dst_port),
        corrupt: cli.corrupt,
    };
    tracing::info!(seed, "wtp-relay starting");

    let relay = Relay::bind(config, StdRng::seed_from_u64(seed))
        .await
        .context("failed to bind relay socket")?;
    relay.run().await.context("relay socket failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_two_host_topology() {
        let cli = Cli::try_parse_from(["wtp-relay", "--dst-port", "2333"]).unwrap();
        assert_eq!(cli.bind_address, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(cli.port, 5001);
        assert_eq!(cli.src_ip, IpAddr::from([10, 0, 0, 1]));
        assert_eq!(cli.dst_ip, IpAddr::from([10, 0, 0, 2]));
        assert_eq!(cli.dst_port, 2333);
        assert_eq!(cli.corrupt, None);
        assert_eq!(cli.seed, None);
    }

    #[test]
    fn grader_arguments_parse() {
        let argv = "wtp-relay --src-ip 127.0.0.1 --dst-ip 127.0.0.1 --dst-port 2333 \
                    --port 5005 --corrupt 0.02";
        let cli = Cli::try_parse_from(argv.split_whitespace()).unwrap();
        assert_eq!(cli.port, 5005);
        assert_eq!(cli.corrupt, Some(0.02));
    }

    #[test]
    fn corruption_must_be_a_probability() {
        assert_eq!(parse_probability("0"), Ok(0.0));
        assert_eq!(parse_probability("1"), Ok(1.0));
        for bad in ["1.5", "-0.1", "NaN", "often"] {
            assert!(parse_probability(bad).is_err(), "{bad} accepted");
        }

        let err = Cli::try_parse_from(["wtp-relay", "--dst-port", "1", "--corrupt", "1.5"])
            .unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn usage_errors_go_to_stderr() {
        let stray = Cli::try_parse_from(["wtp-relay", "--dst-port", "1", "extra"]).unwrap_err();
        assert!(stray.use_stderr());

        let missing = Cli::try_parse_from(["wtp-relay"]).unwrap_err();
        assert!(missing.use_stderr());

        let help = Cli::try_parse_from(["wtp-relay", "--help"]).unwrap_err();
        assert!(!help.use_stderr());
    }
}
