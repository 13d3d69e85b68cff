//! Where a test case's processes run.
//!
//! [`Netns`] builds the two-host namespace topology for every case and
//! tears it down when the hosts are dropped. [`Loopback`] runs everything
//! on the local host without impairment, for environments without root.

use wtp_sim::{HostConfig, NetworkError, TwoHostNetwork};

use crate::supervisor::LaunchSpec;

/// The hosts of one case. Dropping it releases whatever was set up.
pub trait Hosts {
    fn sender_ip(&self) -> &str;
    fn receiver_ip(&self) -> &str;
    /// Run `spec` on the sender's host.
    fn on_sender(&self, spec: LaunchSpec) -> LaunchSpec;
    /// Run `spec` on the receiver's host.
    fn on_receiver(&self, spec: LaunchSpec) -> LaunchSpec;
}

pub trait Testbed {
    type Hosts: Hosts;

    /// Prepare hosts whose sender-to-receiver path is impaired by `netem`.
    fn setup(&self, netem: &str) -> Result<Self::Hosts, NetworkError>;
}

#[derive(Debug, Clone, Default)]
pub struct Netns {
    pub hosts: HostConfig,
}

impl Testbed for Netns {
    type Hosts = TwoHostNetwork;

    fn setup(&self, netem: &str) -> Result<TwoHostNetwork, NetworkError> {
        let network = TwoHostNetwork::build(&self.hosts)?;
        if !netem.is_empty() {
            network.impair_sender_link(netem)?;
        }
        Ok(network)
    }
}

impl Hosts for TwoHostNetwork {
    fn sender_ip(&self) -> &str {
        &self.config().sender.ip
    }

    fn receiver_ip(&self) -> &str {
        &self.config().receiver.ip
    }

    fn on_sender(&self, spec: LaunchSpec) -> LaunchSpec {
        spec.in_namespace(self.sender_host())
    }

    fn on_receiver(&self, spec: LaunchSpec) -> LaunchSpec {
        spec.in_namespace(self.receiver_host())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Loopback;

impl Testbed for Loopback {
    type Hosts = Loopback;

    fn setup(&self, netem: &str) -> Result<Loopback, NetworkError> {
        if !netem.is_empty() {
            tracing::debug!(netem, "loopback testbed ignores impairment");
        }
        Ok(Loopback)
    }
}

impl Hosts for Loopback {
    fn sender_ip(&self) -> &str {
        "127.0.0.1"
    }

    fn receiver_ip(&self) -> &str {
        "127.0.0.1"
    }

    fn on_sender(&self, spec: LaunchSpec) -> LaunchSpec {
        spec
    }

    fn on_receiver(&self, spec: LaunchSpec) -> LaunchSpec {
        spec
    }
}
