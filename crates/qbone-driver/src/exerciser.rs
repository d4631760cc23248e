//! Memory exerciser
//!
//! Test loops over bus memory, built only on the DMA engine:
//!
//! - **address pattern**: every word holds its own (folded) word address.
//!   Written once, read back until something breaks. Catches address-line
//!   faults: a wrong word usually holds the pattern of another address.
//! - **random pattern**: fresh random data every pass, written and read in
//!   randomly sized blocks. Catches data-line faults and stresses arbitration.
//!
//! Both loops stop on cancellation, on a bus timeout, or after the first
//! pass that found a mismatch.

use crate::address::{format_word, Geometry};
use crate::dma::DmaEngine;
use crate::error::{BusError, Result};
use crate::transport::Transport;
use qbone_bus::BusCycleType;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Mismatches diagnosed in detail per pass.
pub const MAX_DIAGNOSED_MISMATCHES: usize = 8;

/// Address-pattern value of the word at `address`.
///
/// Bit 17 is folded into bit 0, so on 22-bit buses the upper 128 KW do not
/// simply repeat the lower pattern.
#[allow(clippy::cast_possible_truncation)]
pub const fn address_pattern_word(address: u32) -> u16 {
    (((address >> 1) & 0xffff) ^ (address >> 17)) as u16
}

/// Cooperative cancellation request for a running exerciser.
///
/// Clones share the flag; cancel from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the exerciser to stop after its current step.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Exerciser algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseMode {
    /// Fixed address pattern, written once
    AddressPattern,
    /// New random pattern every pass, random block sizes
    RandomPattern,
}

impl std::str::FromStr for ExerciseMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "address" | "address-pattern" => Ok(Self::AddressPattern),
            "random" | "random-pattern" => Ok(Self::RandomPattern),
            other => Err(format!("unknown mode '{other}' (expected address or random)")),
        }
    }
}

/// One diagnosed read-back error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Word address
    pub address: u32,
    /// Written value
    pub expected: u16,
    /// Read value
    pub found: u16,
    /// Other addresses whose written value equals `found`
    pub aliases: Vec<u32>,
}

impl Mismatch {
    /// Bits that differ.
    pub const fn diff(&self) -> u16 {
        self.expected ^ self.found
    }
}

/// Why the exerciser stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Cancellation observed at a pass boundary
    Cancelled,
    /// A block timed out
    Timeout {
        /// First address that did not respond
        fault_address: u32,
    },
    /// The last pass found at least one mismatch
    Mismatch,
}

/// Result of one exerciser run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseReport {
    /// Algorithm
    pub mode: ExerciseMode,
    /// Completed read/compare passes
    pub passes: u64,
    /// DMA blocks written
    pub blocks_written: u64,
    /// DMA blocks read
    pub blocks_read: u64,
    /// Why the loop ended
    pub stop: StopReason,
    /// Mismatching words in the failing pass
    pub mismatch_count: usize,
    /// The first [`MAX_DIAGNOSED_MISMATCHES`] of them
    pub mismatches: Vec<Mismatch>,
}

/// Memory test driver on top of a DMA engine.
#[derive(Debug)]
pub struct MemoryExerciser<'t, T: Transport + ?Sized> {
    engine: DmaEngine<'t, T>,
}

impl<'t, T: Transport + ?Sized> MemoryExerciser<'t, T> {
    /// Exerciser using `engine`.
    pub const fn new(engine: DmaEngine<'t, T>) -> Self {
        Self { engine }
    }

    /// Underlying engine (statistics).
    pub const fn engine(&self) -> &DmaEngine<'t, T> {
        &self.engine
    }

    /// Size installed memory: one DATI over everything below the io page.
    ///
    /// The io page is register space, never memory, so the scan stops two
    /// bytes short of it. Returns the first address that did not respond:
    /// 0 for an empty bus, the io page start when every word answered.
    ///
    /// # Errors
    ///
    /// Transport failures only; the expected timeout is the result.
    pub fn probe_installed_size(&mut self) -> Result<u32> {
        let geometry = self.engine.geometry();
        let end = geometry.memory_end();
        let mut buffer = vec![0u16; (end / 2) as usize + 1];
        let first_invalid = match self.engine.read_range(&mut buffer, 0, end) {
            Ok(()) => end + 2,
            Err(BusError::Timeout { fault_address }) => fault_address,
            Err(e) => return Err(e),
        };
        info!(
            "Memory installed: {} KW, first invalid address {}",
            first_invalid / 2048,
            geometry.format_address(first_invalid)
        );
        Ok(first_invalid)
    }

    /// Run `mode` over `[start, end]` until cancelled, a timeout, or a failing pass.
    ///
    /// # Errors
    ///
    /// Invalid range or fatal transport errors. Timeouts and mismatches are
    /// reported in the [`ExerciseReport`].
    pub fn run(
        &mut self,
        start: u32,
        end: u32,
        mode: ExerciseMode,
        cancel: &CancelToken,
    ) -> Result<ExerciseReport> {
        if start % 2 != 0 || end % 2 != 0 || start > end {
            return Err(BusError::invalid_request(format!(
                "bad exerciser range {start:o}..{end:o}"
            )));
        }
        let geometry = self.engine.geometry();
        if end > geometry.max_address() {
            return Err(BusError::invalid_request(format!(
                "exerciser range end {end:o} beyond {}-bit address space",
                geometry.width()
            )));
        }
        info!(
            "Exercising {}..{} with {mode:?}",
            geometry.format_address(start),
            geometry.format_address(end)
        );
        let mut report = ExerciseReport {
            mode,
            passes: 0,
            blocks_written: 0,
            blocks_read: 0,
            stop: StopReason::Cancelled,
            mismatch_count: 0,
            mismatches: Vec::new(),
        };

        let outcome = match mode {
            ExerciseMode::AddressPattern => self.address_loop(start, end, cancel, &mut report),
            ExerciseMode::RandomPattern => self.random_loop(start, end, cancel, &mut report),
        };
        match outcome {
            Ok(stop) => report.stop = stop,
            Err(BusError::Timeout { fault_address }) => {
                error!("Bus timeout at {}", geometry.format_address(fault_address));
                report.stop = StopReason::Timeout { fault_address };
            }
            Err(e) => return Err(e),
        }

        info!(
            "{} passes, {} blocks written, {} blocks read, stopped: {:?}",
            report.passes, report.blocks_written, report.blocks_read, report.stop
        );
        Ok(report)
    }

    fn address_loop(
        &mut self,
        start: u32,
        end: u32,
        cancel: &CancelToken,
        report: &mut ExerciseReport,
    ) -> Result<StopReason> {
        let words = (end / 2) as usize + 1;
        let pattern: Vec<u16> = (0..words)
            .map(|i| address_pattern_word(2 * i as u32))
            .collect();
        let mut readback = vec![0u16; words];

        self.engine.write_range(&pattern, start, end)?;
        report.blocks_written += 1;

        loop {
            if cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }
            self.engine.read_range(&mut readback, start, end)?;
            report.blocks_read += 1;
            report.passes += 1;
            if self.compare(&pattern, &readback, start, end, report) > 0 {
                return Ok(StopReason::Mismatch);
            }
        }
    }

    fn random_loop(
        &mut self,
        start: u32,
        end: u32,
        cancel: &CancelToken,
        report: &mut ExerciseReport,
    ) -> Result<StopReason> {
        let words = (end / 2) as usize + 1;
        let mut pattern = vec![0u16; words];
        let mut readback = vec![0u16; words];
        let range = (start / 2) as usize..words;

        loop {
            if cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }
            let rng = self.engine.rng();
            for word in &mut pattern[range.clone()] {
                *word = rng.random();
            }
            let written =
                self.engine
                    .access_random(BusCycleType::DataOut, &mut pattern, start, end)?;
            report.blocks_written += written as u64;
            let read = self
                .engine
                .access_random(BusCycleType::DataIn, &mut readback, start, end)?;
            report.blocks_read += read as u64;
            report.passes += 1;
            if self.compare(&pattern, &readback, start, end, report) > 0 {
                return Ok(StopReason::Mismatch);
            }
        }
    }

    /// Compare one pass; diagnose the first mismatches. Returns the mismatch count.
    fn compare(
        &self,
        pattern: &[u16],
        readback: &[u16],
        start: u32,
        end: u32,
        report: &mut ExerciseReport,
    ) -> usize {
        let geometry = self.engine.geometry();
        let first = (start / 2) as usize;
        let last = (end / 2) as usize;
        let mut count = 0;
        let mut diagnosed = Vec::new();

        for i in first..=last {
            if pattern[i] == readback[i] {
                continue;
            }
            count += 1;
            if diagnosed.len() < MAX_DIAGNOSED_MISMATCHES {
                let mismatch = diagnose(pattern, first, last, i, readback[i]);
                log_mismatch(&geometry, &mismatch);
                diagnosed.push(mismatch);
            }
        }

        if count > 0 {
            warn!("Pass {}: {count} mismatches", report.passes);
            report.mismatch_count = count;
            report.mismatches = diagnosed;
        }
        count
    }
}

#[allow(clippy::cast_possible_truncation)]
fn diagnose(pattern: &[u16], first: usize, last: usize, index: usize, found: u16) -> Mismatch {
    let aliases = (first..=last)
        .filter(|&j| j != index && pattern[j] == found)
        .map(|j| 2 * j as u32)
        .collect();
    Mismatch {
        address: 2 * index as u32,
        expected: pattern[index],
        found,
        aliases,
    }
}

fn log_mismatch(geometry: &Geometry, m: &Mismatch) {
    error!(
        "Mismatch at {}: expected {}, found {}, diff {}",
        geometry.format_address(m.address),
        format_word(u32::from(m.expected)),
        format_word(u32::from(m.found)),
        format_word(u32::from(m.diff()))
    );
    for alias in &m.aliases {
        error!(
            "  {} found at {} also",
            format_word(u32::from(m.found)),
            geometry.format_address(*alias)
        );
    }
}
