//! Named backplane control signals and arbitration grant lines.

/// Control signal the coprocessor can drive on request of the host.
///
/// The power and reset signals have different names on the two bus
/// families; which ones a variant uses is decided by
/// [`BusVariant`](crate::BusVariant), not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// UNIBUS AC LO: mains power is failing.
    Aclo,
    /// UNIBUS DC LO: DC voltages are about to drop.
    Dclo,
    /// UNIBUS INIT: bus reset.
    Init,
    /// QBUS BPOK H: mains power OK.
    Bpok,
    /// QBUS BDCOK H: DC voltages OK.
    Bdcok,
    /// QBUS BINIT L: bus reset.
    Binit,
}

impl Signal {
    /// Backplane signal name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aclo => "ACLO",
            Self::Dclo => "DCLO",
            Self::Init => "INIT",
            Self::Bpok => "BPOK",
            Self::Bdcok => "BDCOK",
            Self::Binit => "BINIT",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One daisy-chained grant line on the backplane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantLine {
    /// Bus grant, interrupt level 4.
    Bg4,
    /// Bus grant, interrupt level 5.
    Bg5,
    /// Bus grant, interrupt level 6.
    Bg6,
    /// Bus grant, interrupt level 7.
    Bg7,
    /// Non-processor grant (DMA).
    Npg,
}

impl GrantLine {
    /// All grant lines in mask-bit order.
    pub const ALL: [Self; 5] = [Self::Bg4, Self::Bg5, Self::Bg6, Self::Bg7, Self::Npg];

    /// Bit of this line inside a [`GrantMask`].
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Bg4 => 1 << 0,
            Self::Bg5 => 1 << 1,
            Self::Bg6 => 1 << 2,
            Self::Bg7 => 1 << 3,
            Self::Npg => 1 << 4,
        }
    }

    /// Backplane signal name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bg4 => "BG4",
            Self::Bg5 => "BG5",
            Self::Bg6 => "BG6",
            Self::Bg7 => "BG7",
            Self::Npg => "NPG",
        }
    }
}

impl std::fmt::Display for GrantLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sampled state of the grant-line jumpers.
///
/// A set bit means the grant input of the sampled slot is shorted to its
/// output, i.e. the jumper is closed. Produced only by an arbitration probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GrantMask(u8);

impl GrantMask {
    /// All jumpers open.
    pub const CLEAR: Self = Self(0);

    const VALID_BITS: u8 = 0x1f;

    /// Build from raw bits. Bits outside the five grant lines are dropped.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::VALID_BITS)
    }

    /// Build from a set of closed lines.
    #[must_use]
    pub fn from_lines(lines: &[GrantLine]) -> Self {
        Self(lines.iter().fold(0, |acc, line| acc | line.bit()))
    }

    /// Raw mask bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// `true` if no jumper is closed.
    #[must_use]
    pub const fn is_clear(self) -> bool {
        self.0 == 0
    }

    /// `true` if `line` is closed.
    #[must_use]
    pub const fn contains(self, line: GrantLine) -> bool {
        self.0 & line.bit() != 0
    }

    /// Closed lines, in mask-bit order.
    #[must_use]
    pub fn closed_lines(self) -> Vec<GrantLine> {
        GrantLine::ALL
            .into_iter()
            .filter(|line| self.contains(*line))
            .collect()
    }
}

impl std::fmt::Display for GrantMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clear() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.closed_lines().iter().map(|l| l.name()).collect();
        f.write_str(&names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_lists_closed_lines() {
        let mask = GrantMask::from_lines(&[GrantLine::Bg5, GrantLine::Npg]);
        assert_eq!(mask.bits(), 0b1_0010);
        assert_eq!(mask.closed_lines(), vec![GrantLine::Bg5, GrantLine::Npg]);
        assert_eq!(mask.to_string(), "BG5 NPG");
    }

    #[test]
    fn mask_drops_unknown_bits() {
        assert_eq!(GrantMask::from_bits(0xe0), GrantMask::CLEAR);
        assert!(GrantMask::from_bits(0xe0).is_clear());
        assert_eq!(GrantMask::CLEAR.to_string(), "none");
    }
}
