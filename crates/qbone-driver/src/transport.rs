//! Transport abstraction for the coprocessor channel
//!
//! The coprocessor executes bus cycles in real time; the host only sees a
//! synchronous command channel. Every method here blocks until the
//! coprocessor has reported completion.

use crate::error::{BusError, Result};
use qbone_bus::{BusCycleType, GrantMask, Signal};
use std::fmt::Debug;
use std::time::Duration;

/// Synchronous channel to the real-time coprocessor.
///
/// An `Err` from any method means the channel itself broke. A bus timeout
/// during DMA is *not* an error at this level: it is reported in the
/// request (`success == false`, `fault_address` set).
pub trait Transport: Debug {
    /// Execute a DMA request and fill in `success` / `fault_address`.
    ///
    /// For read cycles the sink buffer is filled up to the fault address.
    ///
    /// # Errors
    ///
    /// Returns error if the channel to the coprocessor fails.
    fn submit(&mut self, request: &mut DmaRequest<'_>) -> Result<()>;

    /// Drive a named control signal.
    ///
    /// # Errors
    ///
    /// Returns error if the channel to the coprocessor fails.
    fn set_signal(&mut self, signal: Signal, asserted: bool) -> Result<()>;

    /// Sample the grant-line jumpers.
    ///
    /// Only meaningful right after a power cycle, when no CPU arbitrates.
    ///
    /// # Errors
    ///
    /// Returns error if the channel to the coprocessor fails.
    fn sample_grant_lines(&mut self) -> Result<GrantMask>;

    /// Monotonic time since the transport was opened, ns resolution.
    fn now(&self) -> Duration;

    /// Block the controlling thread.
    fn sleep(&mut self, duration: Duration);

    /// Transport type for debugging
    fn transport_type(&self) -> TransportType;
}

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Shared-memory mailbox to a real coprocessor
    Mailbox,

    /// In-memory bus model, no hardware required
    Software,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mailbox => write!(f, "Mailbox"),
            Self::Software => write!(f, "Software (simulated bus)"),
        }
    }
}

/// Data buffer of a DMA request, owned exclusively for the request's duration.
#[derive(Debug)]
pub enum DmaBuffer<'a> {
    /// Words to write (DATO / DATOB)
    Source(&'a [u16]),
    /// Words to fill (DATI / DATIP)
    Sink(&'a mut [u16]),
}

impl DmaBuffer<'_> {
    /// Number of words.
    pub fn len(&self) -> usize {
        match self {
            Self::Source(words) => words.len(),
            Self::Sink(words) => words.len(),
        }
    }

    /// `true` for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One block transfer, as handed to the coprocessor.
#[derive(Debug)]
pub struct DmaRequest<'a> {
    /// Backplane position of the requesting device (1..=31)
    pub priority_slot: u8,
    /// Cycle executed for every word
    pub cycle: BusCycleType,
    /// Bus byte address of the first word
    pub start_address: u32,
    /// Data
    pub buffer: DmaBuffer<'a>,
    /// Caller waits for completion
    pub blocking: bool,
    /// Set by the transport: every word was acknowledged
    pub success: bool,
    /// Set by the transport on timeout: first address that did not respond
    pub fault_address: u32,
}

impl<'a> DmaRequest<'a> {
    /// Build a request, checking that the buffer direction matches the cycle.
    ///
    /// # Errors
    ///
    /// Returns error if a read cycle is given a source buffer (or vice versa),
    /// the buffer is empty, or the start address is odd.
    pub fn new(
        priority_slot: u8,
        cycle: BusCycleType,
        start_address: u32,
        buffer: DmaBuffer<'a>,
        blocking: bool,
    ) -> Result<Self> {
        match (&buffer, cycle.is_read()) {
            (DmaBuffer::Sink(_), true) | (DmaBuffer::Source(_), false) => {}
            _ => {
                return Err(BusError::invalid_request(format!(
                    "{cycle} with a buffer of the wrong direction"
                )))
            }
        }
        if buffer.is_empty() {
            return Err(BusError::invalid_request(format!("{cycle} of zero words")));
        }
        if start_address % 2 != 0 {
            return Err(BusError::invalid_request(format!(
                "{cycle} at odd address {start_address:o}"
            )));
        }
        Ok(Self {
            priority_slot,
            cycle,
            start_address,
            buffer,
            blocking,
            success: false,
            fault_address: 0,
        })
    }

    /// Number of words to transfer.
    pub fn word_count(&self) -> usize {
        self.buffer.len()
    }

    /// Byte address of the last word.
    #[allow(clippy::cast_possible_truncation)] // word counts are bounded by the 22-bit address space
    pub fn end_address(&self) -> u32 {
        self.start_address + 2 * (self.word_count() as u32 - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_wrong_direction() {
        let words = [0u16; 4];
        let err = DmaRequest::new(1, BusCycleType::DataIn, 0, DmaBuffer::Source(&words), true)
            .unwrap_err();
        assert!(matches!(err, BusError::InvalidRequest { .. }));

        let mut sink = [0u16; 4];
        assert!(
            DmaRequest::new(1, BusCycleType::DataOut, 0, DmaBuffer::Sink(&mut sink), true)
                .is_err()
        );
    }

    #[test]
    fn request_rejects_odd_and_empty() {
        let words = [0u16; 4];
        assert!(
            DmaRequest::new(1, BusCycleType::DataOut, 0o1001, DmaBuffer::Source(&words), true)
                .is_err()
        );
        assert!(DmaRequest::new(1, BusCycleType::DataOut, 0, DmaBuffer::Source(&[]), true).is_err());
    }

    #[test]
    fn request_end_address() {
        let mut sink = [0u16; 8];
        let req = DmaRequest::new(
            31,
            BusCycleType::DataInLocking,
            0o1000,
            DmaBuffer::Sink(&mut sink),
            true,
        )
        .unwrap();
        assert_eq!(req.word_count(), 8);
        assert_eq!(req.end_address(), 0o1016);
        assert!(!req.success);
    }
}
