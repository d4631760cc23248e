//! Transport implementations
//!
//! - **Software**: in-memory bus model with a simulated clock and fault
//!   injection; runs the whole core without hardware (CI, CLI demos).
//!
//! The shared-memory mailbox to a real coprocessor lives outside this crate
//! and plugs in through the [`Transport`](crate::Transport) trait.

pub mod software;

pub use software::{ClockMode, DmaLogEntry, SignalEvent, SoftwareTransport};
