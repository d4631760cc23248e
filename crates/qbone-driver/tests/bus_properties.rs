//! Property tests for geometry, text encodings and random block splitting

use proptest::prelude::*;
use qbone_driver::{
    parse_interrupt_vector, AddressSpace, BusCycleType, BusVariant, DmaConfig, DmaEngine,
    SoftwareTransport,
};

fn geometry(width: u8) -> qbone_driver::Geometry {
    let mut space = AddressSpace::new(BusVariant::Qbus);
    space.configure(width).expect("supported width")
}

fn width() -> impl Strategy<Value = u8> {
    prop_oneof![Just(16u8), Just(18u8), Just(22u8)]
}

proptest! {
    #[test]
    fn prop_counts_consistent(w in width()) {
        let g = geometry(w);
        prop_assert_eq!(g.byte_count(), 2 * g.word_count());
        prop_assert!(g.io_region_start() < g.byte_count());
    }

    #[test]
    fn prop_address_digit_count_fixed(w in width(), addr in any::<u32>()) {
        let g = geometry(w);
        let text = g.format_address(addr);
        let digits = text.trim_start_matches("io");
        let expected = if w == 22 { 8 } else { 6 };
        prop_assert_eq!(digits.len(), expected);
        prop_assert!(digits.chars().all(|c| ('0'..='7').contains(&c)));
    }

    #[test]
    fn prop_address_round_trip(w in width(), seed in any::<u32>()) {
        let g = geometry(w);
        let addr = seed % g.byte_count();
        prop_assert_eq!(g.parse_address(&g.format_address(addr)), Ok(addr));
    }

    #[test]
    fn prop_vector_alignment(v in (0u32..=0o774 / 4).prop_map(|n| n * 4)) {
        let max = 0o774;
        prop_assert_eq!(parse_interrupt_vector(&format!("{v:o}"), max), Ok(v));
        let misaligned = format!("{:o}", v + 1);
        let beyond = format!("{:o}", max + 4);
        prop_assert!(parse_interrupt_vector(&misaligned, max).is_err());
        prop_assert!(parse_interrupt_vector(&beyond, max).is_err());
    }

    #[test]
    fn prop_random_blocks_cover_range(
        seed in any::<u64>(),
        first in 0u32..0o1000,
        len in 1u32..0o2000,
    ) {
        let start = first * 2;
        let end = start + 2 * (len - 1);
        let mut t = SoftwareTransport::new().with_memory(0o10_000);
        let g = AddressSpace::new(BusVariant::Unibus).assert_configured().unwrap();
        let config = DmaConfig::default().with_seed(seed).with_bandwidth_percent(100);
        let mut engine = DmaEngine::new(&mut t, g, config).unwrap();
        let mut buffer = vec![0u16; (end / 2) as usize + 1];
        let blocks = engine.access_random(BusCycleType::DataIn, &mut buffer, start, end).unwrap();
        drop(engine);

        let log = t.dma_log();
        prop_assert_eq!(log.len(), blocks);
        let total: usize = log.iter().map(|e| e.word_count).sum();
        prop_assert_eq!(total, len as usize);
        let last = log.last().unwrap();
        prop_assert_eq!(last.start_address + 2 * (last.word_count as u32 - 1), end);
    }
}
