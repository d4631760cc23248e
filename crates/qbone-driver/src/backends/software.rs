// SPDX-License-Identifier: AGPL-3.0-only

//! Software (simulated bus) transport
//!
//! Implements the `Transport` trait on an in-memory model of a backplane
//! with a contiguous block of memory starting at address 0. This enables:
//!
//! 1. **CI without hardware**: every core algorithm (power sequencing,
//!    arbitration probe, DMA throttling, exercisers) runs against it.
//!
//! 2. **Fault injection**: stuck data bits, a shorted address line and
//!    closed grant jumpers reproduce the failures the exercisers and the
//!    arbitration probe are meant to diagnose.
//!
//! 3. **Deterministic timing**: with [`ClockMode::Simulated`] every sleep
//!    and every bus cycle advances a virtual clock instead of wall time, so a
//!    full power cycle costs nothing in a test.
//!
//! ## Bus model
//!
//! ```text
//! 0 ─────────────── populated_end ───────────── io page ──── max
//! │ memory (responds) │ no response (timeout)  │ no response │
//! ```
//!
//! A DMA block stops at the first word that gets no response; that word's
//! address is reported as the fault address.

use crate::error::Result;
use crate::transport::{DmaBuffer, DmaRequest, Transport, TransportType};
use qbone_bus::{BusCycleType, GrantMask, Signal};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default cost of one simulated bus cycle (UNIBUS DATI is about 1 µs).
pub const DEFAULT_WORD_TIME: Duration = Duration::from_micros(1);

/// How the transport keeps time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// Virtual clock: sleeps and bus cycles advance it instantly
    Simulated,
    /// Wall clock: `Instant` and `std::thread::sleep`
    Real,
}

#[derive(Debug)]
enum Clock {
    Simulated(Duration),
    Real(Instant),
}

/// One submitted DMA request, as seen by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaLogEntry {
    /// Requesting slot
    pub priority_slot: u8,
    /// Cycle type
    pub cycle: BusCycleType,
    /// First address
    pub start_address: u32,
    /// Requested words
    pub word_count: usize,
    /// Outcome
    pub success: bool,
    /// Fault address (0 on success)
    pub fault_address: u32,
}

/// One edge on a control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalEvent {
    /// Transport time of the edge
    pub at: Duration,
    /// Line
    pub signal: Signal,
    /// New level
    pub asserted: bool,
}

/// Software (simulated bus) transport.
#[derive(Debug)]
pub struct SoftwareTransport {
    /// Memory words, indexed by `address / 2`
    memory: Vec<u16>,
    /// Data bits forced to one when reading a word
    stuck_bits: HashMap<u32, u16>,
    /// Address bit shorted high on every cycle
    address_line_stuck: Option<u8>,
    /// Grant jumpers reported as closed
    closed_grants: GrantMask,
    clock: Clock,
    word_time: Duration,
    dma_log: Vec<DmaLogEntry>,
    signal_log: Vec<SignalEvent>,
}

impl Default for SoftwareTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareTransport {
    /// Empty backplane: no memory, simulated clock.
    pub fn new() -> Self {
        Self {
            memory: Vec::new(),
            stuck_bits: HashMap::new(),
            address_line_stuck: None,
            closed_grants: GrantMask::CLEAR,
            clock: Clock::Simulated(Duration::ZERO),
            word_time: DEFAULT_WORD_TIME,
            dma_log: Vec::new(),
            signal_log: Vec::new(),
        }
    }

    /// Install `bytes` of memory starting at address 0.
    ///
    /// Odd sizes are rounded down to a whole word.
    pub fn with_memory(mut self, bytes: u32) -> Self {
        self.memory = vec![0; (bytes / 2) as usize];
        debug!("SoftwareTransport: {} KW memory installed", bytes / 2048);
        self
    }

    /// Select the clock.
    pub fn with_clock(mut self, mode: ClockMode) -> Self {
        self.clock = match mode {
            ClockMode::Simulated => Clock::Simulated(Duration::ZERO),
            ClockMode::Real => Clock::Real(Instant::now()),
        };
        self
    }

    /// Simulated cost of one bus cycle.
    pub fn with_word_time(mut self, word_time: Duration) -> Self {
        self.word_time = word_time;
        self
    }

    /// Force data bits `mask` to one when the word at `address` is read.
    pub fn with_stuck_bits(mut self, address: u32, mask: u16) -> Self {
        *self.stuck_bits.entry(address & !1).or_insert(0) |= mask;
        self
    }

    /// Short address line `bit` high on every cycle.
    pub fn with_address_line_stuck(mut self, bit: u8) -> Self {
        self.address_line_stuck = Some(bit);
        self
    }

    /// Report `mask` as closed grant jumpers.
    pub fn with_closed_grants(mut self, mask: GrantMask) -> Self {
        self.closed_grants = mask;
        self
    }

    /// Word currently stored at `address`, bypassing fault injection.
    pub fn peek(&self, address: u32) -> Option<u16> {
        self.memory.get((address / 2) as usize).copied()
    }

    /// Store a word at `address`, bypassing the bus.
    pub fn poke(&mut self, address: u32, value: u16) {
        if let Some(word) = self.memory.get_mut((address / 2) as usize) {
            *word = value;
        }
    }

    /// Every DMA request submitted so far.
    pub fn dma_log(&self) -> &[DmaLogEntry] {
        &self.dma_log
    }

    /// Every signal edge driven so far.
    pub fn signal_log(&self) -> &[SignalEvent] {
        &self.signal_log
    }

    /// Cell actually selected when the bus drives `address`.
    fn decode(&self, address: u32) -> Option<usize> {
        let effective = match self.address_line_stuck {
            Some(bit) => address | (1 << bit),
            None => address,
        };
        let index = (effective / 2) as usize;
        (index < self.memory.len()).then_some(index)
    }

    fn read_word(&self, address: u32) -> Option<u16> {
        let index = self.decode(address)?;
        let stuck = self.stuck_bits.get(&(address & !1)).copied().unwrap_or(0);
        Some(self.memory[index] | stuck)
    }

    fn write_word(&mut self, address: u32, value: u16, byte: bool) -> bool {
        let Some(index) = self.decode(address) else {
            return false;
        };
        self.memory[index] = if byte {
            (self.memory[index] & 0xff00) | (value & 0x00ff)
        } else {
            value
        };
        true
    }

    fn advance(&mut self, duration: Duration) {
        if let Clock::Simulated(now) = &mut self.clock {
            *now += duration;
        }
    }
}

impl Transport for SoftwareTransport {
    #[allow(clippy::cast_possible_truncation)]
    fn submit(&mut self, request: &mut DmaRequest<'_>) -> Result<()> {
        let start = request.start_address;
        let cycle = request.cycle;
        let mut fault = None;
        let mut done = 0u32;

        match &mut request.buffer {
            DmaBuffer::Sink(words) => {
                for (i, slot) in words.iter_mut().enumerate() {
                    let address = start + 2 * i as u32;
                    match self.read_word(address) {
                        Some(value) => *slot = value,
                        None => {
                            fault = Some(address);
                            break;
                        }
                    }
                    done += 1;
                }
            }
            DmaBuffer::Source(words) => {
                let byte = cycle == BusCycleType::DataOutByte;
                for (i, value) in words.iter().enumerate() {
                    let address = start + 2 * i as u32;
                    if !self.write_word(address, *value, byte) {
                        fault = Some(address);
                        break;
                    }
                    done += 1;
                }
            }
        }

        // a timed-out cycle still costs its full bus timeout (~10 µs on UNIBUS)
        let cycles = done + u32::from(fault.is_some()) * 10;
        self.advance(self.word_time * cycles);

        request.success = fault.is_none();
        request.fault_address = fault.unwrap_or(0);
        trace!(
            "{} {:o}+{} words: success={}",
            cycle,
            start,
            request.word_count(),
            request.success
        );
        self.dma_log.push(DmaLogEntry {
            priority_slot: request.priority_slot,
            cycle,
            start_address: start,
            word_count: request.word_count(),
            success: request.success,
            fault_address: request.fault_address,
        });
        Ok(())
    }

    fn set_signal(&mut self, signal: Signal, asserted: bool) -> Result<()> {
        let at = self.now();
        self.signal_log.push(SignalEvent {
            at,
            signal,
            asserted,
        });
        Ok(())
    }

    fn sample_grant_lines(&mut self) -> Result<GrantMask> {
        Ok(self.closed_grants)
    }

    fn now(&self) -> Duration {
        match &self.clock {
            Clock::Simulated(now) => *now,
            Clock::Real(start) => start.elapsed(),
        }
    }

    fn sleep(&mut self, duration: Duration) {
        match &mut self.clock {
            Clock::Simulated(now) => *now += duration,
            Clock::Real(_) => std::thread::sleep(duration),
        }
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Software
    }
}
