//! Network emulation for WTP conformance runs.
//!
//! Provides Linux network namespace management, a two-host topology joined
//! by a shaped veth link, and `tc netem` impairment of the sender's side.

pub mod impairment;
pub mod network;
pub mod topology;

pub use impairment::{LinkShape, apply_netem, shape_link};
pub use network::{HostConfig, HostSpec, NetworkError, TwoHostNetwork};
pub use topology::Namespace;
