//! Power sequencing
//!
//! Simulates mains power loss and restoration by driving the power-fail
//! lines in the order every CPU and controller on the backplane expects.
//! A started sequence always runs to the end: stopping between edges would
//! leave the bus in an undefined electrical state.

use crate::error::Result;
use crate::transport::Transport;
use qbone_bus::{total_delay, BusVariant, PowerStep};
use tracing::{debug, info};

/// Drives the power-fail and INIT lines for one bus family.
#[derive(Debug, Clone, Copy)]
pub struct PowerSequencer {
    variant: BusVariant,
}

impl PowerSequencer {
    /// Sequencer for `variant`.
    pub const fn new(variant: BusVariant) -> Self {
        Self { variant }
    }

    /// Bus family.
    pub const fn variant(&self) -> BusVariant {
        self.variant
    }

    /// Signal power loss.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn power_down<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        let steps = self.variant.power_down_steps();
        info!("{}: power down, {:?}", self.variant, total_delay(steps));
        run_steps(transport, steps)
    }

    /// Signal power restoration.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn power_up<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        let steps = self.variant.power_up_steps();
        info!("{}: power up, {:?}", self.variant, total_delay(steps));
        run_steps(transport, steps)
    }

    /// Full power cycle: power down, then power up.
    ///
    /// Leaves any CPU on the bus halted or restarting through its power-up
    /// vector.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn power_cycle<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        self.power_down(transport)?;
        self.power_up(transport)
    }

    /// Pulse the bus reset line.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    pub fn pulse_init<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        let signal = self.variant.init_signal();
        let width = self.variant.init_pulse_width();
        info!("{}: {signal} pulse, {width:?}", self.variant);
        transport.set_signal(signal, true)?;
        transport.sleep(width);
        transport.set_signal(signal, false)
    }
}

fn run_steps<T: Transport + ?Sized>(transport: &mut T, steps: &[PowerStep]) -> Result<()> {
    for step in steps {
        debug!(
            "{} {}, wait {:?}",
            step.signal,
            if step.asserted { "asserted" } else { "negated" },
            step.delay
        );
        transport.set_signal(step.signal, step.asserted)?;
        transport.sleep(step.delay);
    }
    Ok(())
}
