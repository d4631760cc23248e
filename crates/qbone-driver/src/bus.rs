//! Bus context
//!
//! One `Bus` per backplane: it owns the transport and the address-space
//! configuration and hands out the core components bound to them. There is
//! no global bus instance; pass the context to whatever needs it.

use crate::address::{AddressSpace, Geometry};
use crate::arbitration::ArbitrationProbe;
use crate::dma::{DmaConfig, DmaEngine};
use crate::error::Result;
use crate::exerciser::MemoryExerciser;
use crate::power::PowerSequencer;
use crate::transport::Transport;
use qbone_bus::{BusVariant, GrantMask};
use tracing::info;

/// A backplane reached through one transport.
#[derive(Debug)]
pub struct Bus<T: Transport> {
    transport: T,
    address_space: AddressSpace,
    sequencer: PowerSequencer,
    dma_config: DmaConfig,
}

impl<T: Transport> Bus<T> {
    /// Bus of family `variant` behind `transport`, default DMA configuration.
    pub fn new(transport: T, variant: BusVariant) -> Self {
        info!("{variant} bus via {}", transport.transport_type());
        Self {
            transport,
            address_space: AddressSpace::new(variant),
            sequencer: PowerSequencer::new(variant),
            dma_config: DmaConfig::default(),
        }
    }

    /// Replace the DMA configuration.
    ///
    /// # Errors
    ///
    /// Returns error if `config` fails validation.
    pub fn with_dma_config(mut self, config: DmaConfig) -> Result<Self> {
        config.validate()?;
        self.dma_config = config;
        Ok(self)
    }

    /// Bus family.
    pub const fn variant(&self) -> BusVariant {
        self.address_space.variant()
    }

    /// Address-space configuration.
    pub const fn address_space(&self) -> &AddressSpace {
        &self.address_space
    }

    /// DMA configuration.
    pub const fn dma_config(&self) -> &DmaConfig {
        &self.dma_config
    }

    /// Transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Select the address width. Entry point for a parameter store.
    ///
    /// # Errors
    ///
    /// Fatal [`BusError::UnsupportedWidth`](crate::BusError::UnsupportedWidth).
    pub fn configure(&mut self, width: u8) -> Result<Geometry> {
        self.address_space.configure(width)
    }

    /// Configured geometry.
    ///
    /// # Errors
    ///
    /// Fatal [`BusError::WidthNotConfigured`](crate::BusError::WidthNotConfigured).
    pub fn geometry(&self) -> Result<Geometry> {
        self.address_space.assert_configured()
    }

    /// Simulate a power failure and restoration.
    ///
    /// # Errors
    ///
    /// Width not configured, or transport failure.
    pub fn power_cycle(&mut self) -> Result<()> {
        self.geometry()?;
        self.sequencer.power_cycle(&mut self.transport)
    }

    /// Pulse the bus reset line.
    ///
    /// # Errors
    ///
    /// Width not configured, or transport failure.
    pub fn pulse_init(&mut self) -> Result<()> {
        self.geometry()?;
        self.sequencer.pulse_init(&mut self.transport)
    }

    /// Power-cycle and sample the grant jumpers.
    ///
    /// # Errors
    ///
    /// Fatal [`BusError::ArbitrationFault`](crate::BusError::ArbitrationFault)
    /// when a jumper is closed and `error_if_closed` is set.
    pub fn probe_arbitration(&mut self, error_if_closed: bool) -> Result<GrantMask> {
        self.geometry()?;
        ArbitrationProbe::new(self.sequencer).probe(&mut self.transport, error_if_closed)
    }

    /// DMA engine bound to this bus.
    ///
    /// # Errors
    ///
    /// Width not configured.
    pub fn dma(&mut self) -> Result<DmaEngine<'_, T>> {
        let geometry = self.geometry()?;
        DmaEngine::new(&mut self.transport, geometry, self.dma_config.clone())
    }

    /// Memory exerciser bound to this bus.
    ///
    /// # Errors
    ///
    /// Width not configured.
    pub fn exerciser(&mut self) -> Result<MemoryExerciser<'_, T>> {
        self.dma().map(MemoryExerciser::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::SoftwareTransport;
    use crate::error::BusError;

    #[test]
    fn qbus_operations_require_width() {
        let mut bus = Bus::new(SoftwareTransport::new(), BusVariant::Qbus);
        assert!(matches!(bus.power_cycle(), Err(BusError::WidthNotConfigured { .. })));
        assert!(matches!(bus.dma(), Err(BusError::WidthNotConfigured { .. })));
        // nothing reached the bus
        assert!(bus.transport().signal_log().is_empty());

        bus.configure(22).unwrap();
        bus.pulse_init().unwrap();
        assert_eq!(bus.transport().signal_log().len(), 2);
    }

    #[test]
    fn unibus_ready_without_configuration() {
        let mut bus = Bus::new(SoftwareTransport::new().with_memory(0o1000), BusVariant::Unibus);
        assert_eq!(bus.geometry().unwrap().width(), 18);
        assert_eq!(bus.exerciser().unwrap().probe_installed_size().unwrap(), 0o1000);
    }

    #[test]
    fn dma_config_validated() {
        let bus = Bus::new(SoftwareTransport::new(), BusVariant::Unibus);
        assert!(bus
            .with_dma_config(DmaConfig::default().with_bandwidth_percent(0))
            .is_err());
    }
}
