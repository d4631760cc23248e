//! Bus cycle types.
//!
//! The wire code is the C1/C0 pair driven by the bus master:
//!
//! ```text
//! C1 C0   cycle
//! ── ──   ─────
//!  0  0   DATI   data in (read)
//!  0  1   DATIP  data in, pause (locking read)
//!  1  0   DATO   data out (word write)
//!  1  1   DATOB  data out, byte (byte write)
//! ```

/// A single bus transaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusCycleType {
    /// DATI: word read.
    DataIn,
    /// DATIP: read that locks the bus for a following write.
    DataInLocking,
    /// DATO: word write.
    DataOut,
    /// DATOB: byte write.
    DataOutByte,
}

impl BusCycleType {
    /// All cycle types in wire-code order.
    pub const ALL: [Self; 4] = [
        Self::DataIn,
        Self::DataInLocking,
        Self::DataOut,
        Self::DataOutByte,
    ];

    /// C1/C0 wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::DataIn => 0,
            Self::DataInLocking => 1,
            Self::DataOut => 2,
            Self::DataOutByte => 3,
        }
    }

    /// Decode a C1/C0 wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::DataIn),
            1 => Some(Self::DataInLocking),
            2 => Some(Self::DataOut),
            3 => Some(Self::DataOutByte),
            _ => None,
        }
    }

    /// Legacy mnemonic, as printed by the historical diagnostics.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::DataIn => "DATI",
            Self::DataInLocking => "DATIP",
            Self::DataOut => "DATO",
            Self::DataOutByte => "DATOB",
        }
    }

    /// `true` for DATI and DATIP (slave drives the data lines).
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::DataIn | Self::DataInLocking)
    }
}

impl std::fmt::Display for BusCycleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for cycle in BusCycleType::ALL {
            assert_eq!(BusCycleType::from_code(cycle.code()), Some(cycle));
        }
        assert_eq!(BusCycleType::from_code(4), None);
    }

    #[test]
    fn read_cycles() {
        assert!(BusCycleType::DataIn.is_read());
        assert!(BusCycleType::DataInLocking.is_read());
        assert!(!BusCycleType::DataOut.is_read());
        assert!(!BusCycleType::DataOutByte.is_read());
    }
}
