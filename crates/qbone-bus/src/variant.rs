//! Bus family strategy.
//!
//! UNIBUS backplanes carry a hard-wired 18-bit address; QBUS backplanes
//! are jumpered for 16, 18 or 22 bits. Both reserve the top 8 KB of the
//! address space for device registers (the "io page").

use crate::power::{
    PowerStep, QBUS_INIT_PULSE, QBUS_POWER_DOWN, QBUS_POWER_UP, UNIBUS_INIT_PULSE,
    UNIBUS_POWER_DOWN, UNIBUS_POWER_UP,
};
use crate::signal::Signal;
use std::time::Duration;

/// Size of the io page in bytes.
pub const IO_PAGE_BYTES: u32 = 8192;

/// Bus family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusVariant {
    /// DEC UNIBUS (PDP-11/20 … 11/70).
    Unibus,
    /// DEC QBUS / LSI-11 bus.
    Qbus,
}

impl BusVariant {
    /// Address widths the backplane can be configured for.
    #[must_use]
    pub const fn supported_widths(self) -> &'static [u8] {
        match self {
            Self::Unibus => &[18],
            Self::Qbus => &[16, 18, 22],
        }
    }

    /// Width fixed by the bus wiring, if any.
    #[must_use]
    pub const fn fixed_width(self) -> Option<u8> {
        match self {
            Self::Unibus => Some(18),
            Self::Qbus => None,
        }
    }

    /// `true` if `width` is in [`supported_widths`](Self::supported_widths).
    #[must_use]
    pub fn supports_width(self, width: u8) -> bool {
        self.supported_widths().contains(&width)
    }

    /// First byte address of the io page for `width`.
    #[must_use]
    pub const fn io_region_start(self, width: u8) -> u32 {
        (1u32 << width) - IO_PAGE_BYTES
    }

    /// Power-loss sequence.
    #[must_use]
    pub const fn power_down_steps(self) -> &'static [PowerStep] {
        match self {
            Self::Unibus => &UNIBUS_POWER_DOWN,
            Self::Qbus => &QBUS_POWER_DOWN,
        }
    }

    /// Power-restore sequence.
    #[must_use]
    pub const fn power_up_steps(self) -> &'static [PowerStep] {
        match self {
            Self::Unibus => &UNIBUS_POWER_UP,
            Self::Qbus => &QBUS_POWER_UP,
        }
    }

    /// Bus reset line.
    #[must_use]
    pub const fn init_signal(self) -> Signal {
        match self {
            Self::Unibus => Signal::Init,
            Self::Qbus => Signal::Binit,
        }
    }

    /// Width of a software-generated INIT pulse.
    #[must_use]
    pub const fn init_pulse_width(self) -> Duration {
        match self {
            Self::Unibus => UNIBUS_INIT_PULSE,
            Self::Qbus => QBUS_INIT_PULSE,
        }
    }

    /// Lower-case family name, as accepted on command lines.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unibus => "unibus",
            Self::Qbus => "qbus",
        }
    }
}

impl std::fmt::Display for BusVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unibus => f.write_str("UNIBUS"),
            Self::Qbus => f.write_str("QBUS"),
        }
    }
}

impl std::str::FromStr for BusVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Unibus, Self::Qbus]
            .into_iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown bus variant '{s}' (expected unibus or qbus)"))
    }
}
