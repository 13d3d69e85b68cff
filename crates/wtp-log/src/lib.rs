//! Sender event-log checks for WTP conformance runs.
//!
//! - **Records**: one `<type> <seq> <len> <checksum>` line per packet event
//! - **Policies**: named behavioural requirements (`has_dupACK`, `no_reTrans`, ...)
//! - **Verification**: structural rules plus requested policies over a whole log

pub mod policy;
pub mod record;
pub mod verify;

pub use policy::{Policy, PolicyError, PolicySet};
pub use record::{PacketRecord, PacketType, ParseError};
pub use verify::{
    LogError, LogSummary, LogVerifier, MAX_LOG_LINES, MIN_LOG_LINES, Verdict, verify_file,
    verify_lines, verify_reader,
};
