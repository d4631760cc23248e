//! End-to-end scenarios against the software transport

use qbone_driver::{
    parse_word, Bus, BusCycleType, BusError, BusVariant, CancelToken, ClockMode, DmaBuffer,
    DmaConfig, ExerciseMode, GrantLine, GrantMask, Signal, SoftwareTransport, StopReason,
};
use std::time::Instant;

#[test]
fn io_marker_on_18_bit_bus() {
    let mut bus = Bus::new(SoftwareTransport::new(), BusVariant::Qbus);
    let g = bus.configure(18).unwrap();
    assert_eq!(g.io_region_start(), 0o760_000);
    assert!(g.format_address(0o760_000).starts_with("io"));
    assert!(!g.format_address(0o757_776).contains("io"));
}

#[test]
fn word_literals() {
    assert_eq!(parse_word("'A"), Ok(65));
    assert_eq!(parse_word("101"), Ok(65));
}

#[test]
fn sizing_empty_and_populated_buses() {
    let mut bus = Bus::new(SoftwareTransport::new(), BusVariant::Unibus);
    assert_eq!(bus.exerciser().unwrap().probe_installed_size().unwrap(), 0);

    let x = 0o157_776;
    let mut bus = Bus::new(SoftwareTransport::new().with_memory(x + 2), BusVariant::Unibus);
    assert_eq!(bus.exerciser().unwrap().probe_installed_size().unwrap(), x + 2);
}

#[test]
fn throttle_holds_on_wall_clock() {
    let transport = SoftwareTransport::new()
        .with_memory(0o400_000)
        .with_clock(ClockMode::Real);
    let mut bus = Bus::new(transport, BusVariant::Qbus)
        .with_dma_config(DmaConfig::default().with_seed(3))
        .unwrap();
    bus.configure(18).unwrap();
    let mut dma = bus.dma().unwrap();

    let data = vec![0o52525u16; 0o100_000];
    let t0 = Instant::now();
    let completion = dma
        .transfer(true, BusCycleType::DataOut, 0, DmaBuffer::Source(&data))
        .unwrap()
        .unwrap();
    let wall = t0.elapsed();
    assert!(completion.success);
    assert!(wall >= completion.elapsed * 2);
}

#[test]
fn arbitration_fault_is_fatal_and_bus_was_power_cycled() {
    let closed = GrantMask::from_lines(&[GrantLine::Npg]);
    let mut bus = Bus::new(
        SoftwareTransport::new().with_closed_grants(closed),
        BusVariant::Qbus,
    );
    bus.configure(22).unwrap();
    let err = bus.probe_arbitration(true).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, BusError::ArbitrationFault { .. }));
    let edges: Vec<Signal> = bus.transport().signal_log().iter().map(|e| e.signal).collect();
    assert_eq!(edges, vec![Signal::Bpok, Signal::Bdcok, Signal::Bdcok, Signal::Bpok]);
}

#[test]
fn exerciser_finds_bad_memory_and_reports_counts() {
    let transport = SoftwareTransport::new()
        .with_memory(0o100_000)
        .with_stuck_bits(0o40_000, 1);
    let mut bus = Bus::new(transport, BusVariant::Unibus)
        .with_dma_config(DmaConfig::default().with_seed(11))
        .unwrap();
    let size = bus.exerciser().unwrap().probe_installed_size().unwrap();
    let report = bus
        .exerciser()
        .unwrap()
        .run(0, size - 2, ExerciseMode::AddressPattern, &CancelToken::new())
        .unwrap();
    assert_eq!(report.stop, StopReason::Mismatch);
    assert_eq!(report.blocks_written, 1);
    assert_eq!(report.blocks_read, 1);
    assert_eq!(report.mismatches[0].address, 0o40_000);
}

#[test]
fn exerciser_priority_slot_reaches_the_bus() {
    let mut bus = Bus::new(SoftwareTransport::new().with_memory(0o1000), BusVariant::Unibus)
        .with_dma_config(DmaConfig::default().with_priority_slot(7).with_seed(1))
        .unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    bus.exerciser()
        .unwrap()
        .run(0, 0o776, ExerciseMode::AddressPattern, &cancel)
        .unwrap();
    assert!(bus.transport().dma_log().iter().all(|e| e.priority_slot == 7));
}
