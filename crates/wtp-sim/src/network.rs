//! Two-host topology used by every conformance run.
//!
//! `h1` runs the sender (and the relay, when one is used), `h2` runs the
//! receiver. Both ends of the veth link get the base [`LinkShape`]; only
//! h1's netem qdisc is later rewritten with a test's impairment descriptor,
//! so impairment applies to sender-to-receiver traffic.

use std::io;

use thiserror::Error;

use crate::impairment::{LinkShape, apply_netem, shape_link};
use crate::topology::Namespace;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to create namespace {name}")]
    Namespace {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to link {local} to {peer}")]
    Link {
        local: String,
        peer: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to shape {interface}")]
    Shape {
        interface: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to apply netem '{descriptor}' to {interface}")]
    Netem {
        interface: String,
        descriptor: String,
        #[source]
        source: io::Error,
    },
}

/// One side of the topology.
#[derive(Debug, Clone, PartialEq)]
pub struct HostSpec {
    pub namespace: String,
    pub interface: String,
    /// Address without prefix length, e.g. `10.0.0.1`.
    pub ip: String,
    pub prefix_len: u8,
}

impl HostSpec {
    fn cidr(&self) -> String {
        format!("{}/{}", self.ip, self.prefix_len)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub sender: HostSpec,
    pub receiver: HostSpec,
    pub shape: LinkShape,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sender: HostSpec {
                namespace: "wtp_h1".into(),
                interface: "h1-eth0".into(),
                ip: "10.0.0.1".into(),
                prefix_len: 24,
            },
            receiver: HostSpec {
                namespace: "wtp_h2".into(),
                interface: "h2-eth0".into(),
                ip: "10.0.0.2".into(),
                prefix_len: 24,
            },
            shape: LinkShape::default(),
        }
    }
}

/// The live topology. Dropping it deletes both namespaces, which also
/// removes the veth pair.
#[derive(Debug)]
pub struct TwoHostNetwork {
    config: HostConfig,
    // Field order matters: the receiver namespace is removed last.
    sender: Namespace,
    receiver: Namespace,
}

impl TwoHostNetwork {
    pub fn build(config: &HostConfig) -> Result<Self, NetworkError> {
        let namespace = |spec: &HostSpec| {
            Namespace::new(&spec.namespace).map_err(|source| NetworkError::Namespace {
                name: spec.namespace.clone(),
                source,
            })
        };
        let sender = namespace(&config.sender)?;
        let receiver = namespace(&config.receiver)?;

        sender
            .add_veth_link(
                &receiver,
                &config.sender.interface,
                &config.receiver.interface,
                &config.sender.cidr(),
                &config.receiver.cidr(),
            )
            .map_err(|source| NetworkError::Link {
                local: config.sender.interface.clone(),
                peer: config.receiver.interface.clone(),
                source,
            })?;

        for (ns, spec) in [(&sender, &config.sender), (&receiver, &config.receiver)] {
            shape_link(ns, &spec.interface, &config.shape).map_err(|source| {
                NetworkError::Shape {
                    interface: spec.interface.clone(),
                    source,
                }
            })?;
        }

        tracing::debug!(
            sender = %config.sender.ip,
            receiver = %config.receiver.ip,
            rate_mbit = config.shape.rate_mbit,
            delay = %config.shape.delay,
            "two-host network up"
        );

        Ok(Self {
            config: config.clone(),
            sender,
            receiver,
        })
    }

    pub fn sender_host(&self) -> &Namespace {
        &self.sender
    }

    pub fn receiver_host(&self) -> &Namespace {
        &self.receiver
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Replace the netem parameters on the sender's interface.
    pub fn impair_sender_link(&self, descriptor: &str) -> Result<(), NetworkError> {
        let interface = &self.config.sender.interface;
        apply_netem(&self.sender, interface, descriptor).map_err(|source| NetworkError::Netem {
            interface: interface.clone(),
            descriptor: descriptor.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{netns_available, scratch_ns_name};

    #[test]
    fn default_hosts_share_a_subnet() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.sender.cidr(), "10.0.0.1/24");
        assert_eq!(cfg.receiver.cidr(), "10.0.0.2/24");
        assert!(cfg.sender.interface.len() <= 15);
    }

    #[test]
    fn test_two_host_network() {
        if !netns_available() {
            eprintln!("Skipping test_two_host_network, insufficient privileges");
            return;
        }

        let suffix = std::process::id() % 10_000;
        let config = HostConfig {
            sender: HostSpec {
                namespace: scratch_ns_name("wtp_s"),
                interface: format!("ws{suffix}"),
                ip: "10.202.0.1".into(),
                prefix_len: 24,
            },
            receiver: HostSpec {
                namespace: scratch_ns_name("wtp_r"),
                interface: format!("wr{suffix}"),
                ip: "10.202.0.2".into(),
                prefix_len: 24,
            },
            shape: LinkShape::default(),
        };

        let net = match TwoHostNetwork::build(&config) {
            Ok(net) => net,
            Err(NetworkError::Shape { source, .. })
                if source.to_string().contains("qdisc kind is unknown") =>
            {
                eprintln!("Skipping test_two_host_network, netem qdisc not available");
                return;
            }
            Err(e) => panic!("Failed to build network: {e}"),
        };
        net.impair_sender_link("delay 1ms loss 0%")
            .expect("Failed to impair link");

        let out = net
            .sender_host()
            .exec("ping", &["-c", "1", "-W", "1", "10.202.0.2"])
            .expect("Failed to exec ping");
        assert!(
            out.status.success(),
            "Ping failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
    }
}
