//! Host-side driver core for a UNIBUS / QBUS bridge.
//!
//! A real-time coprocessor drives the backplane signals; this crate runs on
//! the host next to it and tells it what to do through a synchronous
//! [`Transport`]. It owns the address-space geometry, DMA block transfers,
//! power sequencing and the memory exercisers.
//!
//! # Component stack
//!
//! ```text
//! AddressSpace ──► PowerSequencer ──► ArbitrationProbe
//!      │
//!      └─────────► DmaEngine ───────► MemoryExerciser
//!                      │
//!                  Transport  (mailbox to coprocessor, or SoftwareTransport)
//! ```
//!
//! # Quick start
//!
//! ```
//! use qbone_driver::{Bus, BusVariant, CancelToken, ExerciseMode, SoftwareTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = SoftwareTransport::new().with_memory(0o200_000);
//! let mut bus = Bus::new(transport, BusVariant::Qbus);
//! bus.configure(22)?;
//!
//! let size = bus.exerciser()?.probe_installed_size()?;
//! assert_eq!(size, 0o200_000);
//!
//! let cancel = CancelToken::new();
//! cancel.cancel();
//! let report = bus.exerciser()?.run(0, size - 2, ExerciseMode::AddressPattern, &cancel)?;
//! println!("{} passes", report.passes);
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Configuration and arbitration errors are fatal ([`BusError::is_fatal`]):
//! callers terminate on them. Bus timeouts are recoverable and reported with
//! the first non-responding address.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod address;
mod arbitration;
pub mod backends;
mod bus;
pub mod dma;
mod error;
pub mod exerciser;
mod power;
mod transport;

pub use address::{
    format_cycle, format_word, parse_interrupt_level, parse_interrupt_vector,
    parse_priority_slot, parse_word, AddressSpace, Geometry,
};
pub use arbitration::ArbitrationProbe;
pub use backends::{ClockMode, SoftwareTransport};
pub use bus::Bus;
pub use dma::{DmaCompletion, DmaConfig, DmaEngine, DmaStats};
pub use error::{BusError, ParseError, Result};
pub use exerciser::{
    CancelToken, ExerciseMode, ExerciseReport, MemoryExerciser, Mismatch, StopReason,
};
pub use power::PowerSequencer;
pub use transport::{DmaBuffer, DmaRequest, Transport, TransportType};

pub use qbone_bus::{BusCycleType, BusVariant, GrantLine, GrantMask, Signal};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Bus, BusCycleType, BusError, BusVariant, CancelToken, DmaConfig, ExerciseMode,
        ExerciseReport, Geometry, Result, SoftwareTransport, StopReason, Transport,
    };
}
