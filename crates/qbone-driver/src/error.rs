//! Error types for bus driver operations

use qbone_bus::{BusVariant, GrantMask};
use thiserror::Error;

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations
///
/// Configuration and arbitration errors are *fatal*: they mean the bus is
/// wired or set up wrongly and further bus cycles could damage a running
/// system. Callers are expected to terminate on them (see [`BusError::is_fatal`]).
/// A DMA timeout is the only recoverable variant.
#[derive(Debug, Error)]
pub enum BusError {
    /// Address width not supported by the bus family
    #[error("{variant}: unsupported address width {width} (supported: {supported:?})")]
    UnsupportedWidth {
        /// Bus family
        variant: BusVariant,
        /// Requested width
        width: u8,
        /// Widths the family supports
        supported: &'static [u8],
    },

    /// A bus operation was attempted before an address width was chosen
    #[error("{variant}: address width not configured")]
    WidthNotConfigured {
        /// Bus family
        variant: BusVariant,
    },

    /// Engine parameter out of range
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong
        reason: String,
    },

    /// Grant-line jumpers closed: arbitration on this backplane would hang or
    /// generate spurious grants
    #[error("Arbitration fault: grant jumpers closed on {closed}")]
    ArbitrationFault {
        /// Lines found closed
        closed: GrantMask,
    },

    /// No slave answered a DMA cycle
    #[error("Bus timeout at {fault_address:o}")]
    Timeout {
        /// First address that did not respond
        fault_address: u32,
    },

    /// Malformed DMA request
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// What is wrong
        reason: String,
    },

    /// The channel to the coprocessor failed
    #[error("Transport error: {reason}")]
    Transport {
        /// Reason for failure
        reason: String,
    },
}

impl BusError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// `true` unless the error is a recoverable bus timeout.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Timeout { .. })
    }

    /// Fault address of a timeout.
    pub const fn fault_address(&self) -> Option<u32> {
        match self {
            Self::Timeout { fault_address } => Some(*fault_address),
            _ => None,
        }
    }
}

/// Errors from the textual `parse_*` routines.
///
/// Parsing never aborts; where a value could still be derived it is carried
/// in the error for diagnostic display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing to parse
    #[error("empty input")]
    Empty,

    /// Not a number in the expected radix
    #[error("malformed value '{text}'")]
    Malformed {
        /// Offending input
        text: String,
    },

    /// A number, but not an acceptable one
    #[error("value '{text}' out of range")]
    OutOfRange {
        /// Offending input
        text: String,
        /// Parsed (or clamped) value
        value: u32,
    },
}

impl ParseError {
    /// Best-effort value, if one could be derived.
    pub const fn best_effort(&self) -> Option<u32> {
        match self {
            Self::OutOfRange { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn malformed(text: &str) -> Self {
        Self::Malformed {
            text: text.to_owned(),
        }
    }

    pub(crate) fn out_of_range(text: &str, value: u32) -> Self {
        Self::OutOfRange {
            text: text.to_owned(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_are_recoverable() {
        assert!(!BusError::Timeout { fault_address: 0o1000 }.is_fatal());
        assert!(BusError::ArbitrationFault { closed: GrantMask::from_bits(1) }.is_fatal());
        assert!(BusError::WidthNotConfigured { variant: BusVariant::Qbus }.is_fatal());
        assert!(BusError::transport("mailbox gone").is_fatal());
    }

    #[test]
    fn timeout_message_is_octal() {
        let e = BusError::Timeout { fault_address: 0o760_000 };
        assert_eq!(e.to_string(), "Bus timeout at 760000");
        assert_eq!(e.fault_address(), Some(0o760_000));
    }

    #[test]
    fn best_effort_values() {
        assert_eq!(ParseError::out_of_range("10", 8).best_effort(), Some(8));
        assert_eq!(ParseError::Empty.best_effort(), None);
    }
}
