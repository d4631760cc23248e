//! DMA transaction engine
//!
//! Block transfers between host buffers and bus memory, with a bandwidth
//! throttle that leaves the bus to an emulated CPU for the rest of the time.
//!
//! # Throttling
//!
//! ```text
//! |<── T: transfer ──>|<──── T·(100/p) − T: idle ────>|
//! ```
//!
//! With `bandwidth_percent = p` the engine sleeps after every transfer so
//! that DMA holds the bus for at most `p` percent of wall time.

use crate::address::Geometry;
use crate::error::{BusError, Result};
use crate::transport::{DmaBuffer, DmaRequest, Transport};
use qbone_bus::BusCycleType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::{debug, warn};

/// Default backplane position of the bridge's DMA request logic.
pub const DEFAULT_PRIORITY_SLOT: u8 = 31;

/// Default share of bus time DMA may consume.
pub const DEFAULT_BANDWIDTH_PERCENT: u32 = 50;

/// DMA engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaConfig {
    /// Backplane slot used in every request (1..=31)
    pub priority_slot: u8,

    /// Maximum percentage of bus time used by DMA (1..=100)
    pub bandwidth_percent: u32,

    /// Seed for random block splitting; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for DmaConfig {
    fn default() -> Self {
        Self {
            priority_slot: DEFAULT_PRIORITY_SLOT,
            bandwidth_percent: DEFAULT_BANDWIDTH_PERCENT,
            seed: None,
        }
    }
}

impl DmaConfig {
    /// Defaults, overridden by `QBONE_DMA_PRIORITY_SLOT`,
    /// `QBONE_DMA_BANDWIDTH_PERCENT` and `QBONE_DMA_SEED` when set.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but does not parse, or the result
    /// fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(slot) = env_var("QBONE_DMA_PRIORITY_SLOT")? {
            config.priority_slot = slot;
        }
        if let Some(percent) = env_var("QBONE_DMA_BANDWIDTH_PERCENT")? {
            config.bandwidth_percent = percent;
        }
        if let Some(seed) = env_var("QBONE_DMA_SEED")? {
            config.seed = Some(seed);
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the priority slot.
    #[must_use]
    pub fn with_priority_slot(mut self, slot: u8) -> Self {
        self.priority_slot = slot;
        self
    }

    /// Set the bandwidth share.
    #[must_use]
    pub fn with_bandwidth_percent(mut self, percent: u32) -> Self {
        self.bandwidth_percent = percent;
        self
    }

    /// Fix the random seed (reproducible block splitting and patterns).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// [`BusError::InvalidConfig`] for a slot outside 1..=31 or a bandwidth
    /// outside 1..=100.
    pub fn validate(&self) -> Result<()> {
        if !(1..=31).contains(&self.priority_slot) {
            return Err(BusError::invalid_config(format!(
                "priority slot {} not in 1..31",
                self.priority_slot
            )));
        }
        if !(1..=100).contains(&self.bandwidth_percent) {
            return Err(BusError::invalid_config(format!(
                "DMA bandwidth {}% not in 1..100",
                self.bandwidth_percent
            )));
        }
        Ok(())
    }
}

fn env_var<V: std::str::FromStr>(name: &str) -> Result<Option<V>> {
    match std::env::var(name) {
        Ok(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BusError::invalid_config(format!("{name}={text} does not parse"))),
        Err(_) => Ok(None),
    }
}

/// Outcome of one submitted request, copied out of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaCompletion {
    /// Cycle type
    pub cycle: BusCycleType,
    /// First address
    pub start_address: u32,
    /// Words requested
    pub word_count: usize,
    /// Every word acknowledged
    pub success: bool,
    /// First non-responding address (valid when `!success`)
    pub fault_address: u32,
    /// Transport time spent in the transfer itself
    pub elapsed: Duration,
}

/// Counters kept across the engine's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmaStats {
    /// Requests submitted
    pub transfers: u64,
    /// Words requested
    pub words: u64,
    /// Requests that timed out
    pub timeouts: u64,
    /// Time spent sleeping in the throttle
    pub throttled: Duration,
}

/// DMA engine bound to one transport.
#[derive(Debug)]
pub struct DmaEngine<'t, T: Transport + ?Sized> {
    transport: &'t mut T,
    geometry: Geometry,
    config: DmaConfig,
    rng: StdRng,
    stats: DmaStats,
    pending: Option<DmaCompletion>,
}

impl<'t, T: Transport + ?Sized> DmaEngine<'t, T> {
    /// Create an engine for a configured address space.
    ///
    /// # Errors
    ///
    /// Returns error if `config` fails validation.
    pub fn new(transport: &'t mut T, geometry: Geometry, config: DmaConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        debug!(
            "DMA engine: slot {}, bandwidth {}%, via {}",
            config.priority_slot,
            config.bandwidth_percent,
            transport.transport_type()
        );
        Ok(Self {
            transport,
            geometry,
            config,
            rng,
            stats: DmaStats::default(),
            pending: None,
        })
    }

    /// Address-space geometry.
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Engine configuration.
    pub const fn config(&self) -> &DmaConfig {
        &self.config
    }

    /// Counters.
    pub const fn stats(&self) -> DmaStats {
        self.stats
    }

    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Submit one block transfer.
    ///
    /// Blocking transfers return their completion. Non-blocking transfers
    /// return `None`; the completion is collected later with
    /// [`take_completion`](Self::take_completion).
    ///
    /// # Errors
    ///
    /// Returns error for a malformed request or a transport failure. A bus
    /// timeout is *not* an error here; see [`DmaCompletion::success`].
    pub fn transfer(
        &mut self,
        blocking: bool,
        cycle: BusCycleType,
        start_address: u32,
        buffer: DmaBuffer<'_>,
    ) -> Result<Option<DmaCompletion>> {
        let mut request = DmaRequest::new(
            self.config.priority_slot,
            cycle,
            start_address,
            buffer,
            blocking,
        )?;
        debug!(
            "DMA {} {:o}..{:o}, slot {}",
            cycle,
            start_address,
            request.end_address(),
            self.config.priority_slot
        );

        let t0 = self.transport.now();
        self.transport.submit(&mut request)?;
        let elapsed = self.transport.now().saturating_sub(t0);

        let completion = DmaCompletion {
            cycle,
            start_address,
            word_count: request.word_count(),
            success: request.success,
            fault_address: request.fault_address,
            elapsed,
        };

        self.stats.transfers += 1;
        self.stats.words += completion.word_count as u64;
        if !completion.success {
            self.stats.timeouts += 1;
        }
        self.throttle(elapsed);

        if blocking {
            Ok(Some(completion))
        } else {
            self.pending = Some(completion);
            Ok(None)
        }
    }

    /// Completion of the last non-blocking transfer, if not yet collected.
    pub fn take_completion(&mut self) -> Option<DmaCompletion> {
        self.pending.take()
    }

    fn throttle(&mut self, elapsed: Duration) {
        let percent = self.config.bandwidth_percent;
        if percent >= 100 {
            return;
        }
        let total = elapsed * 100 / percent;
        let idle = total.saturating_sub(elapsed);
        if !idle.is_zero() {
            self.transport.sleep(idle);
            self.stats.throttled += idle;
        }
    }

    fn blocking(
        &mut self,
        cycle: BusCycleType,
        start_address: u32,
        buffer: DmaBuffer<'_>,
    ) -> Result<DmaCompletion> {
        let completion = self
            .transfer(true, cycle, start_address, buffer)?
            .ok_or_else(|| BusError::transport("blocking transfer returned no completion"))?;
        if completion.success {
            return Ok(completion);
        }
        warn!(
            "{cycle} {}: bus timeout at {}",
            self.geometry.format_address(start_address),
            self.geometry.format_address(completion.fault_address)
        );
        Err(BusError::Timeout {
            fault_address: completion.fault_address,
        })
    }

    /// Write `[start, end]` from `buffer` (indexed by `address / 2`) in one DATO block.
    ///
    /// # Errors
    ///
    /// [`BusError::Timeout`] with the first non-responding address;
    /// [`BusError::InvalidRequest`] for a bad range.
    pub fn write_range(&mut self, buffer: &[u16], start: u32, end: u32) -> Result<()> {
        let words = self.range_slice(buffer.len(), start, end)?;
        self.blocking(
            BusCycleType::DataOut,
            start,
            DmaBuffer::Source(&buffer[words]),
        )
        .map(|_| ())
    }

    /// Read `[start, end]` into `buffer` (indexed by `address / 2`) in one DATI block.
    ///
    /// # Errors
    ///
    /// [`BusError::Timeout`] with the first non-responding address;
    /// [`BusError::InvalidRequest`] for a bad range.
    pub fn read_range(&mut self, buffer: &mut [u16], start: u32, end: u32) -> Result<()> {
        let words = self.range_slice(buffer.len(), start, end)?;
        self.blocking(
            BusCycleType::DataIn,
            start,
            DmaBuffer::Sink(&mut buffer[words]),
        )
        .map(|_| ())
    }

    /// Transfer `[start, end]` as a run of randomly sized blocks.
    ///
    /// Block sizes favour short blocks, so arbitration logic is exercised
    /// far more often than with one large block. Returns the number of
    /// blocks issued.
    ///
    /// # Errors
    ///
    /// [`BusError::Timeout`] for the first block that times out (no further
    /// blocks are issued); [`BusError::InvalidRequest`] for a bad range.
    pub fn access_random(
        &mut self,
        cycle: BusCycleType,
        buffer: &mut [u16],
        start: u32,
        end: u32,
    ) -> Result<usize> {
        self.range_slice(buffer.len(), start, end)?;
        let mut address = start;
        let mut blocks = 0;
        loop {
            let remaining = (end - address) / 2 + 1;
            let count = random_block_words(&mut self.rng, remaining);
            let first = (address / 2) as usize;
            let words = &mut buffer[first..first + count as usize];
            let data = if cycle.is_read() {
                DmaBuffer::Sink(words)
            } else {
                DmaBuffer::Source(words)
            };
            self.blocking(cycle, address, data)?;
            blocks += 1;
            if count == remaining {
                break;
            }
            address += 2 * count;
        }
        Ok(blocks)
    }

    /// Word indices of `[start, end]`, validated against buffer and geometry.
    fn range_slice(
        &self,
        buffer_words: usize,
        start: u32,
        end: u32,
    ) -> Result<std::ops::RangeInclusive<usize>> {
        if start % 2 != 0 || end % 2 != 0 || start > end {
            return Err(BusError::invalid_request(format!(
                "bad range {start:o}..{end:o}"
            )));
        }
        if end > self.geometry.max_address() {
            return Err(BusError::invalid_request(format!(
                "range end {} beyond {}-bit address space",
                self.geometry.format_address(end),
                self.geometry.width()
            )));
        }
        let last = (end / 2) as usize;
        if last >= buffer_words {
            return Err(BusError::invalid_request(format!(
                "buffer of {buffer_words} words does not cover {end:o}"
            )));
        }
        Ok((start / 2) as usize..=last)
    }
}

/// Random block length in words, `1..=remaining`.
///
/// The length is drawn uniformly below a power of two whose exponent is
/// itself uniform, so short blocks dominate while long ones still occur.
pub fn random_block_words<R: Rng>(rng: &mut R, remaining: u32) -> u32 {
    debug_assert!(remaining > 0);
    let max_exponent = 31 - remaining.leading_zeros();
    let exponent = rng.random_range(0..=max_exponent);
    let upper = (1u32 << exponent).min(remaining);
    rng.random_range(1..=upper)
}
