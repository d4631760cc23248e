//! Pure model of the DEC UNIBUS / QBUS backplane.
//!
//! This crate has **no dependencies** and **no hardware access**: it is a
//! model of the bus itself, i.e. the address widths each bus family can
//! carry, the cycle types, the named control signals, the arbitration grant
//! lines, and the timed power-sequencing step tables.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`variant`] | `BusVariant` strategy: widths, io page, signal names |
//! | [`cycle`] | `BusCycleType` (DATI, DATIP, DATO, DATOB) |
//! | [`signal`] | Named control signals, grant lines and `GrantMask` |
//! | [`power`] | Power-down / power-up step tables and INIT pulse widths |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cycle;
pub mod power;
pub mod signal;
pub mod variant;

pub use cycle::BusCycleType;
pub use power::{total_delay, PowerStep, POWER_STEP_DELAY};
pub use signal::{GrantLine, GrantMask, Signal};
pub use variant::BusVariant;
