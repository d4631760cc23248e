//! Power-sequencing step tables.
//!
//! Losing and restoring mains power is signalled to every device on the
//! backplane by two open-collector lines, asserted in a fixed order with
//! minimum gaps between edges:
//!
//! ```text
//!            UNIBUS                       QBUS
//! down   ACLO asserted   → wait       BPOK negated   → wait
//!        DCLO asserted   → wait       BDCOK negated  → wait
//! up     DCLO negated    → wait       BDCOK asserted → wait
//!        ACLO negated    → wait       BPOK asserted  → wait
//! ```
//!
//! The documented minimum gaps are 5 ms (DCLO/BDCOK) and 70 ms (power
//! fail to DC loss on 11/xx CPUs). [`POWER_STEP_DELAY`] sits well above both.

use crate::signal::Signal;
use std::time::Duration;

/// Gap after every power-sequence edge.
pub const POWER_STEP_DELAY: Duration = Duration::from_millis(200);

/// INIT pulse width on UNIBUS.
pub const UNIBUS_INIT_PULSE: Duration = Duration::from_millis(10);

/// BINIT pulse width on QBUS. The KDF11/KDJ11 CPUs drive about 10 µs.
pub const QBUS_INIT_PULSE: Duration = Duration::from_micros(20);

/// One edge of a power sequence: drive `signal` to `asserted`, then wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerStep {
    /// Line to drive.
    pub signal: Signal,
    /// Logical level; `true` = asserted.
    pub asserted: bool,
    /// Wait after the edge before the next step.
    pub delay: Duration,
}

impl PowerStep {
    const fn new(signal: Signal, asserted: bool) -> Self {
        Self {
            signal,
            asserted,
            delay: POWER_STEP_DELAY,
        }
    }
}

/// UNIBUS power loss: ACLO then DCLO.
pub const UNIBUS_POWER_DOWN: [PowerStep; 2] = [
    PowerStep::new(Signal::Aclo, true),
    PowerStep::new(Signal::Dclo, true),
];

/// UNIBUS power restoration: DCLO then ACLO.
pub const UNIBUS_POWER_UP: [PowerStep; 2] = [
    PowerStep::new(Signal::Dclo, false),
    PowerStep::new(Signal::Aclo, false),
];

/// QBUS power loss: BPOK then BDCOK.
pub const QBUS_POWER_DOWN: [PowerStep; 2] = [
    PowerStep::new(Signal::Bpok, false),
    PowerStep::new(Signal::Bdcok, false),
];

/// QBUS power restoration: BDCOK then BPOK.
pub const QBUS_POWER_UP: [PowerStep; 2] = [
    PowerStep::new(Signal::Bdcok, true),
    PowerStep::new(Signal::Bpok, true),
];

/// Sum of the delays of a step list.
#[must_use]
pub fn total_delay(steps: &[PowerStep]) -> Duration {
    steps.iter().map(|s| s.delay).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn down_and_up_are_mirrored() {
        for (down, up) in [
            (UNIBUS_POWER_DOWN, UNIBUS_POWER_UP),
            (QBUS_POWER_DOWN, QBUS_POWER_UP),
        ] {
            assert_eq!(down[0].signal, up[1].signal);
            assert_eq!(down[1].signal, up[0].signal);
            assert_ne!(down[0].asserted, up[1].asserted);
            assert_ne!(down[1].asserted, up[0].asserted);
        }
    }

    #[test]
    fn step_delays_exceed_hardware_minimums() {
        assert!(POWER_STEP_DELAY >= Duration::from_millis(70));
        assert_eq!(total_delay(&UNIBUS_POWER_DOWN), POWER_STEP_DELAY * 2);
    }
}
