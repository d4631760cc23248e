//! Arbitration wiring probe
//!
//! Every empty backplane slot between devices needs its grant jumpers
//! (BG4..BG7, NPG) closed, and every occupied one needs them open. A closed
//! jumper behind our own slot means grants pass straight through: a live
//! CPU would see a spurious acknowledge the first time we arbitrate.

use crate::error::{BusError, Result};
use crate::power::PowerSequencer;
use crate::transport::Transport;
use qbone_bus::GrantMask;
use tracing::{error, info};

/// Samples the grant lines on a quiescent bus.
#[derive(Debug, Clone, Copy)]
pub struct ArbitrationProbe {
    sequencer: PowerSequencer,
}

impl ArbitrationProbe {
    /// Probe using `sequencer` to bring the bus into a known state.
    pub const fn new(sequencer: PowerSequencer) -> Self {
        Self { sequencer }
    }

    /// Power-cycle the bus, then sample the grant jumpers.
    ///
    /// The power cycle halts any CPU, so no grant is in flight while sampling.
    ///
    /// # Errors
    ///
    /// [`BusError::ArbitrationFault`] if a jumper is closed and `error_if_closed`
    /// is set; transport errors otherwise.
    pub fn probe<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        error_if_closed: bool,
    ) -> Result<GrantMask> {
        self.sequencer.power_cycle(transport)?;
        let mask = transport.sample_grant_lines()?;

        if mask.is_clear() {
            info!("Grant lines: all jumpers open");
            return Ok(mask);
        }

        if error_if_closed {
            for line in mask.closed_lines() {
                error!("{line} IN-OUT jumper closed: remove it or move the card");
            }
            return Err(BusError::ArbitrationFault { closed: mask });
        }

        info!("Grant lines: jumpers closed on {mask}");
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::SoftwareTransport;
    use qbone_bus::{BusVariant, GrantLine};

    fn probe() -> ArbitrationProbe {
        ArbitrationProbe::new(PowerSequencer::new(BusVariant::Unibus))
    }

    #[test]
    fn open_jumpers_pass() {
        let mut t = SoftwareTransport::new();
        assert_eq!(probe().probe(&mut t, true).unwrap(), GrantMask::CLEAR);
        // power cycle ran before sampling
        assert_eq!(t.signal_log().len(), 4);
    }

    #[test]
    fn closed_jumper_is_fatal_when_requested() {
        let closed = GrantMask::from_lines(&[GrantLine::Bg7, GrantLine::Npg]);
        let mut t = SoftwareTransport::new().with_closed_grants(closed);
        let err = probe().probe(&mut t, true).unwrap_err();
        assert!(err.is_fatal());
        match err {
            BusError::ArbitrationFault { closed: mask } => assert_eq!(mask, closed),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn closed_jumper_reported_otherwise() {
        let closed = GrantMask::from_lines(&[GrantLine::Bg4]);
        let mut t = SoftwareTransport::new().with_closed_grants(closed);
        assert_eq!(probe().probe(&mut t, false).unwrap(), closed);
    }
}
