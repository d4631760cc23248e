//! `qbone`: command-line interface for the UNIBUS / QBUS bridge driver.
//!
//! ```text
//! USAGE:
//!   qbone size                              Size installed memory
//!   qbone exercise <start> <end>            Run a memory exerciser
//!   qbone power-cycle                       Simulate power fail / restore
//!   qbone init                              Pulse bus INIT
//!   qbone probe-arbitration                 Check grant-line jumpers
//!   qbone format <address>                  Show an address in bus notation
//! ```
//!
//! Runs against the software bus model; `--memory-kw` sets how much memory
//! it has installed.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use qbone_driver::prelude::*;
use qbone_driver::format_word;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Largest simulated memory: the whole 22-bit address space, in kilowords.
const MAX_MEMORY_KW: u32 = 2048;

#[derive(Parser)]
#[command(name = "qbone", about = "UNIBUS / QBUS bridge driver CLI", version)]
struct Cli {
    /// Bus family: unibus or qbus.
    #[arg(long, default_value = "unibus")]
    variant: BusVariant,

    /// Address width in bits (QBUS: 16, 18 or 22; UNIBUS is always 18).
    #[arg(long)]
    width: Option<u8>,

    /// Memory installed in the simulated bus, in kilowords.
    #[arg(
        long,
        default_value_t = 124,
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_MEMORY_KW))
    )]
    memory_kw: u32,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Find the first address that does not respond.
    Size,
    /// Run a memory exerciser over an octal address range.
    Exercise {
        /// First address (octal).
        start: String,
        /// Last address (octal).
        end: String,
        /// address or random.
        #[arg(long, default_value = "address")]
        mode: ExerciseMode,
        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Simulate a power failure and restoration.
    PowerCycle,
    /// Pulse the bus reset line.
    Init,
    /// Power-cycle and check the grant-line jumpers.
    ProbeArbitration {
        /// Report closed jumpers instead of failing.
        #[arg(long)]
        no_error: bool,
    },
    /// Show an octal address in bus notation.
    Format {
        /// Address (octal).
        address: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut bus = open_bus(&cli)?;

    let outcome = match cli.command {
        Cmd::Size => cmd_size(&mut bus),
        Cmd::Exercise {
            start,
            end,
            mode,
            seconds,
        } => cmd_exercise(&mut bus, &start, &end, mode, seconds),
        Cmd::PowerCycle => bus.power_cycle().map_err(Into::into),
        Cmd::Init => bus.pulse_init().map_err(Into::into),
        Cmd::ProbeArbitration { no_error } => cmd_probe_arbitration(&mut bus, !no_error),
        Cmd::Format { address } => cmd_format(&bus, &address),
    };

    if let Err(e) = &outcome {
        if e.downcast_ref::<BusError>().is_some_and(BusError::is_fatal) {
            warn!("fatal bus error, exiting");
            eprintln!("FATAL: {e}");
            std::process::exit(2);
        }
    }
    outcome
}

fn open_bus(cli: &Cli) -> Result<Bus<SoftwareTransport>> {
    info!("Software bus, {} KW installed", cli.memory_kw);
    let transport = SoftwareTransport::new().with_memory(cli.memory_kw * 2048);
    let mut bus = Bus::new(transport, cli.variant).with_dma_config(DmaConfig::from_env()?)?;
    match (cli.width, cli.variant.fixed_width()) {
        (Some(width), _) => {
            bus.configure(width)?;
        }
        (None, Some(_)) => {}
        (None, None) => bail!("--width is required for {}", cli.variant),
    }
    Ok(bus)
}

fn cmd_size(bus: &mut Bus<SoftwareTransport>) -> Result<()> {
    let geometry = bus.geometry()?;
    let first_invalid = bus.exerciser()?.probe_installed_size()?;
    if first_invalid == 0 {
        println!("No memory installed");
    } else {
        println!(
            "Memory: {} KW, last valid address {}",
            first_invalid / 2048,
            geometry.format_address(first_invalid - 2)
        );
    }
    Ok(())
}

fn cmd_exercise(
    bus: &mut Bus<SoftwareTransport>,
    start: &str,
    end: &str,
    mode: ExerciseMode,
    seconds: Option<u64>,
) -> Result<()> {
    let geometry = bus.geometry()?;
    let start = geometry.parse_address(start)?;
    let end = geometry.parse_address(end)?;

    let cancel = CancelToken::new();
    if let Some(secs) = seconds {
        let timer = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            info!("{secs} s elapsed, cancelling exerciser");
            timer.cancel();
        });
    }

    let mut exerciser = bus.exerciser()?;
    let report = exerciser.run(start, end, mode, &cancel)?;
    let stats = exerciser.engine().stats();

    println!("Mode          : {:?}", report.mode);
    println!("Passes        : {}", report.passes);
    println!("Blocks written: {}", report.blocks_written);
    println!("Blocks read   : {}", report.blocks_read);
    println!("DMA words     : {}  ({} throttled)", stats.words, humanize(stats.throttled));
    match report.stop {
        StopReason::Cancelled => println!("Stopped       : cancelled"),
        StopReason::Timeout { fault_address } => println!(
            "Stopped       : bus timeout at {}",
            geometry.format_address(fault_address)
        ),
        StopReason::Mismatch => {
            println!("Stopped       : {} mismatches", report.mismatch_count);
            for m in &report.mismatches {
                println!(
                    "  {}  expected {}  found {}  diff {}",
                    geometry.format_address(m.address),
                    format_word(u32::from(m.expected)),
                    format_word(u32::from(m.found)),
                    format_word(u32::from(m.diff()))
                );
                for alias in &m.aliases {
                    println!("      also written at {}", geometry.format_address(*alias));
                }
            }
        }
    }
    Ok(())
}

fn cmd_probe_arbitration(bus: &mut Bus<SoftwareTransport>, error_if_closed: bool) -> Result<()> {
    let mask = bus.probe_arbitration(error_if_closed)?;
    println!("Closed grant jumpers: {mask}");
    Ok(())
}

fn cmd_format(bus: &Bus<SoftwareTransport>, address: &str) -> Result<()> {
    let geometry = bus.geometry()?;
    let addr = geometry.parse_address(address)?;
    println!("{}", geometry.format_address(addr));
    Ok(())
}

fn humanize(d: Duration) -> String {
    format!("{:.3} s", d.as_secs_f64())
}
