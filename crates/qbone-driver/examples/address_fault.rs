//! Address-line fault diagnosis on a simulated bus
//!
//! Shorts address line A12 high, sizes memory, then runs the
//! address-pattern exerciser to show how a wrong word is traced back to
//! the address whose pattern it actually holds.

use qbone_driver::{
    format_word, Bus, BusVariant, CancelToken, ExerciseMode, Result, SoftwareTransport,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("qbone_driver=info")
        .init();

    println!("Address-line fault demo\n");

    let transport = SoftwareTransport::new()
        .with_memory(0o200_000)
        .with_address_line_stuck(12);
    let mut bus = Bus::new(transport, BusVariant::Qbus);
    let geometry = bus.configure(18)?;

    let size = bus.exerciser()?.probe_installed_size()?;
    println!("Memory ends at {}\n", geometry.format_address(size));

    let report = bus
        .exerciser()?
        .run(0, size - 2, ExerciseMode::AddressPattern, &CancelToken::new())?;

    println!(
        "{} mismatches after {} pass(es)",
        report.mismatch_count, report.passes
    );
    for m in &report.mismatches {
        println!(
            "  {} expected {} found {} (written at {:?})",
            geometry.format_address(m.address),
            format_word(u32::from(m.expected)),
            format_word(u32::from(m.found)),
            m.aliases
                .iter()
                .map(|a| geometry.format_address(*a))
                .collect::<Vec<_>>()
        );
    }

    Ok(())
}
