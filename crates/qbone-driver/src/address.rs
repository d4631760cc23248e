//! Address-space geometry and the legacy text encodings.
//!
//! All numbers are octal, as on every PDP-11 console and listing. The
//! encodings here must stay bit-exact with the historical tooling.

use crate::error::{BusError, ParseError, Result};
use qbone_bus::{BusCycleType, BusVariant};
use std::num::IntErrorKind;
use tracing::{debug, info};

/// Derived geometry of a configured address width.
///
/// Always built as a whole from the width, so the derived counts can never
/// disagree with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    width: u8,
    word_count: u32,
    byte_count: u32,
    io_region_start: u32,
}

impl Geometry {
    fn new(variant: BusVariant, width: u8) -> Self {
        let word_count = 1u32 << (width - 1);
        Self {
            width,
            word_count,
            byte_count: 2 * word_count,
            io_region_start: variant.io_region_start(width),
        }
    }

    /// Address width in bits.
    pub const fn width(&self) -> u8 {
        self.width
    }

    /// Number of 16-bit words in the address space.
    pub const fn word_count(&self) -> u32 {
        self.word_count
    }

    /// Number of bytes in the address space.
    pub const fn byte_count(&self) -> u32 {
        self.byte_count
    }

    /// First byte address of the device-register page.
    pub const fn io_region_start(&self) -> u32 {
        self.io_region_start
    }

    /// Highest byte address.
    pub const fn max_address(&self) -> u32 {
        self.byte_count - 1
    }

    /// Highest word address below the io page.
    pub const fn memory_end(&self) -> u32 {
        self.io_region_start - 2
    }

    // 16-bit addresses print with an extra bit so a 16-bit CPU's
    // 0177776 and a 17-bit overflow stay distinguishable.
    const fn display_mask(&self) -> u32 {
        match self.width {
            16 => 0o377_777,
            18 => 0o777_777,
            _ => 0o17_777_777,
        }
    }

    const fn display_digits(&self) -> usize {
        if self.width > 18 {
            8
        } else {
            6
        }
    }

    /// `true` if `addr` lies inside the device-register page.
    pub const fn is_io(&self, addr: u32) -> bool {
        (addr & self.display_mask() & !1) >= self.io_region_start
    }

    /// Zero-padded octal, `io`-prefixed inside the device-register page.
    pub fn format_address(&self, addr: u32) -> String {
        let masked = addr & self.display_mask();
        let digits = self.display_digits();
        if self.is_io(addr) {
            format!("io{masked:0digits$o}")
        } else {
            format!("{masked:0digits$o}")
        }
    }

    /// Parse an octal address, as produced by [`format_address`](Self::format_address).
    ///
    /// # Errors
    ///
    /// Malformed text, or an address above [`max_address`](Self::max_address).
    /// In the latter case the error carries the clamped maximum.
    pub fn parse_address(&self, text: &str) -> std::result::Result<u32, ParseError> {
        let trimmed = text.trim();
        let digits = trimmed.strip_prefix("io").unwrap_or(trimmed);
        let max = self.max_address();
        match parse_octal(digits) {
            Ok(addr) if addr <= max => Ok(addr),
            Ok(_) => Err(ParseError::out_of_range(text, max)),
            Err(ParseError::OutOfRange { .. }) => Err(ParseError::out_of_range(text, max)),
            Err(e) => Err(e),
        }
    }
}

/// Configured address space of one bus.
#[derive(Debug, Clone)]
pub struct AddressSpace {
    variant: BusVariant,
    geometry: Option<Geometry>,
}

impl AddressSpace {
    /// Address space for `variant`; already configured if its width is hard-wired.
    pub fn new(variant: BusVariant) -> Self {
        let geometry = variant.fixed_width().map(|w| Geometry::new(variant, w));
        Self { variant, geometry }
    }

    /// Bus family.
    pub const fn variant(&self) -> BusVariant {
        self.variant
    }

    /// Current geometry, if a width has been chosen.
    pub const fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    /// Select the address width.
    ///
    /// # Errors
    ///
    /// [`BusError::UnsupportedWidth`] if the bus family cannot carry `width`.
    pub fn configure(&mut self, width: u8) -> Result<Geometry> {
        if !self.variant.supports_width(width) {
            return Err(BusError::UnsupportedWidth {
                variant: self.variant,
                width,
                supported: self.variant.supported_widths(),
            });
        }
        let geometry = Geometry::new(self.variant, width);
        self.geometry = Some(geometry);
        info!(
            "{}: {width}-bit addressing, {} words, io page at {}",
            self.variant,
            geometry.word_count(),
            geometry.format_address(geometry.io_region_start())
        );
        Ok(geometry)
    }

    /// Geometry, or a fatal error if no width was chosen yet.
    ///
    /// # Errors
    ///
    /// [`BusError::WidthNotConfigured`].
    pub fn assert_configured(&self) -> Result<Geometry> {
        self.geometry.ok_or(BusError::WidthNotConfigured {
            variant: self.variant,
        })
    }
}

/// Mnemonic of a C1/C0 cycle code; `???` for anything else.
pub fn format_cycle(code: u8) -> &'static str {
    BusCycleType::from_code(code).map_or("???", BusCycleType::mnemonic)
}

/// 6-digit octal word; `??????` if it does not fit 16 bits.
pub fn format_word(value: u32) -> String {
    if value <= 0xffff {
        format!("{value:06o}")
    } else {
        "??????".to_owned()
    }
}

/// Parse a data word: octal, or `'c` for the character code of `c`.
///
/// # Errors
///
/// Empty or malformed text, a non-ASCII character, or a number above 0177777.
pub fn parse_word(text: &str) -> std::result::Result<u16, ParseError> {
    if let Some(rest) = text.strip_prefix('\'') {
        let mut chars = rest.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => Ok(c as u16),
            (None, _) => Err(ParseError::Empty),
            _ => Err(ParseError::malformed(text)),
        };
    }
    let value = parse_octal(text)?;
    u16::try_from(value).map_err(|_| ParseError::out_of_range(text, value))
}

/// Parse an interrupt request level, octal 4..=7.
///
/// # Errors
///
/// Malformed text, or a level outside 4..=7 (value carried).
pub fn parse_interrupt_level(text: &str) -> std::result::Result<u8, ParseError> {
    let level = parse_octal(text)?;
    match u8::try_from(level) {
        Ok(l @ 4..=7) => Ok(l),
        _ => Err(ParseError::out_of_range(text, level)),
    }
}

/// Parse an interrupt vector, octal, a multiple of 4 no larger than `max_vector`.
///
/// # Errors
///
/// Malformed text, a vector above `max_vector`, or one not 4-aligned (value carried).
pub fn parse_interrupt_vector(text: &str, max_vector: u32) -> std::result::Result<u32, ParseError> {
    let vector = parse_octal(text)?;
    if vector > max_vector || vector % 4 != 0 {
        debug!("rejected vector {vector:o} (max {max_vector:o})");
        return Err(ParseError::out_of_range(text, vector));
    }
    Ok(vector)
}

/// Parse a backplane priority slot, decimal 1..=31.
///
/// # Errors
///
/// Malformed text, or a slot outside 1..=31 (value carried).
pub fn parse_priority_slot(text: &str) -> std::result::Result<u8, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let slot = trimmed.parse::<u32>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => ParseError::out_of_range(text, u32::MAX),
        _ => ParseError::malformed(text),
    })?;
    match u8::try_from(slot) {
        Ok(s @ 1..=31) => Ok(s),
        _ => Err(ParseError::out_of_range(text, slot)),
    }
}

fn parse_octal(text: &str) -> std::result::Result<u32, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    u32::from_str_radix(trimmed, 8).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => ParseError::out_of_range(text, u32::MAX),
        _ => ParseError::malformed(text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbone_bus::variant::IO_PAGE_BYTES;

    fn qbus(width: u8) -> Geometry {
        let mut space = AddressSpace::new(BusVariant::Qbus);
        space.configure(width).unwrap()
    }

    #[test]
    fn derived_counts_follow_width() {
        for width in [16, 18, 22] {
            let g = qbus(width);
            assert_eq!(g.byte_count(), 2 * g.word_count());
            assert_eq!(g.byte_count(), 1 << width);
            assert_eq!(g.io_region_start(), g.byte_count() - IO_PAGE_BYTES);
        }
    }

    #[test]
    fn unibus_is_configured_at_construction() {
        let space = AddressSpace::new(BusVariant::Unibus);
        assert_eq!(space.assert_configured().unwrap().width(), 18);
    }

    #[test]
    fn qbus_requires_configuration() {
        let space = AddressSpace::new(BusVariant::Qbus);
        assert!(matches!(
            space.assert_configured(),
            Err(BusError::WidthNotConfigured { .. })
        ));
    }

    #[test]
    fn unsupported_width_rejected() {
        let mut space = AddressSpace::new(BusVariant::Unibus);
        let err = space.configure(22).unwrap_err();
        assert!(matches!(err, BusError::UnsupportedWidth { width: 22, .. }));
        assert!(err.is_fatal());
        // previous geometry survives a rejected reconfiguration
        assert_eq!(space.assert_configured().unwrap().width(), 18);
    }

    #[test]
    fn reconfigure_replaces_whole_geometry() {
        let mut space = AddressSpace::new(BusVariant::Qbus);
        space.configure(16).unwrap();
        let g = space.configure(22).unwrap();
        assert_eq!(g.word_count(), 1 << 21);
        assert_eq!(g.io_region_start(), 0o17_760_000);
    }

    #[test]
    fn address_digit_counts() {
        assert_eq!(qbus(16).format_address(0o1000), "001000");
        assert_eq!(qbus(18).format_address(0o1000), "001000");
        assert_eq!(qbus(22).format_address(0o1000), "00001000");
    }

    #[test]
    fn address_masks() {
        assert_eq!(qbus(16).format_address(0o1_100_000), "100000");
        assert_eq!(qbus(18).format_address(0o1_000_002), "000002");
        assert_eq!(qbus(22).format_address(0o20_000_004), "00000004");
    }

    #[test]
    fn io_marker_at_page_boundary() {
        let g = qbus(18);
        assert_eq!(g.io_region_start(), 0o760_000);
        assert_eq!(g.format_address(0o760_000), "io760000");
        assert_eq!(g.format_address(0o757_776), "757776");
        assert_eq!(g.format_address(0o777_777), "io777777");
    }

    #[test]
    fn parse_accepts_io_prefix() {
        let g = qbus(18);
        assert_eq!(g.parse_address("io760000"), Ok(0o760_000));
        assert_eq!(g.parse_address(" 1000 "), Ok(0o1000));
    }

    #[test]
    fn parse_address_clamps() {
        let g = qbus(16);
        let err = g.parse_address("200000").unwrap_err();
        assert_eq!(err.best_effort(), Some(0o177_777));
        let err = g.parse_address("77777777777777").unwrap_err();
        assert_eq!(err.best_effort(), Some(0o177_777));
        assert_eq!(g.parse_address("8"), Err(ParseError::malformed("8")));
        assert_eq!(g.parse_address(""), Err(ParseError::Empty));
    }

    #[test]
    fn cycle_mnemonics() {
        assert_eq!(format_cycle(0), "DATI");
        assert_eq!(format_cycle(1), "DATIP");
        assert_eq!(format_cycle(2), "DATO");
        assert_eq!(format_cycle(3), "DATOB");
        assert_eq!(format_cycle(9), "???");
    }

    #[test]
    fn word_formatting() {
        assert_eq!(format_word(0), "000000");
        assert_eq!(format_word(0xffff), "177777");
        assert_eq!(format_word(0x1_0000), "??????");
    }

    #[test]
    fn word_parsing() {
        assert_eq!(parse_word("'A"), Ok(65));
        assert_eq!(parse_word("101"), Ok(65));
        assert_eq!(parse_word("' "), Ok(32));
        assert_eq!(parse_word(""), Err(ParseError::Empty));
        assert_eq!(parse_word("'"), Err(ParseError::Empty));
        assert!(parse_word("'AB").is_err());
        assert!(parse_word("'\u{e9}").is_err());
        assert_eq!(parse_word("200000").unwrap_err().best_effort(), Some(0o200_000));
    }

    #[test]
    fn interrupt_levels() {
        assert_eq!(parse_interrupt_level("4"), Ok(4));
        assert_eq!(parse_interrupt_level("7"), Ok(7));
        assert_eq!(parse_interrupt_level("3").unwrap_err().best_effort(), Some(3));
        assert_eq!(parse_interrupt_level("10").unwrap_err().best_effort(), Some(8));
    }

    #[test]
    fn interrupt_vectors() {
        assert_eq!(parse_interrupt_vector("60", 0o774), Ok(0o60));
        assert!(parse_interrupt_vector("61", 0o774).is_err());
        assert!(parse_interrupt_vector("1000", 0o774).is_err());
        assert_eq!(parse_interrupt_vector("774", 0o774), Ok(0o774));
    }

    #[test]
    fn priority_slots() {
        assert_eq!(parse_priority_slot("1"), Ok(1));
        assert_eq!(parse_priority_slot("31"), Ok(31));
        assert!(parse_priority_slot("0").is_err());
        assert_eq!(parse_priority_slot("32").unwrap_err().best_effort(), Some(32));
        assert!(parse_priority_slot("x").is_err());
    }
}
