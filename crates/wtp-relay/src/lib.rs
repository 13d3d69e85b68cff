//! Corrupting UDP relay for WTP conformance runs.
//!
//! [`relay::Relay`] forwards between one sender and one receiver,
//! optionally damaging sender payloads with [`corrupt::corrupt`].

pub mod corrupt;
pub mod relay;

pub use corrupt::{Corruption, HEADER_LEN, corrupt};
pub use relay::{DropReason, Relay, RelayConfig, RelayState, Route, SenderPort};
