use embedded_hal::spi::{Operation, SpiDevice};

use super::Bus;
use crate::registers::{self as reg, Channel};

/// SC16IS7xx attached over SPI.
///
/// The chip needs SPI mode 0, MSB first, at up to 4 MHz (SC16IS740/750/752)
/// or 15 MHz (SC16IS760/762). The [`SpiDevice`] owns chip select, so every
/// method below runs with CS asserted for exactly one command.
pub struct SpiBus<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> SpiBus<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Consume the transport and return the SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> Bus for SpiBus<SPI> {
    type Error = SPI::Error;

    const MAX_READ_CHUNK: usize = reg::FIFO_SIZE;
    const MAX_WRITE_CHUNK: usize = reg::FIFO_SIZE;

    fn read_register(&mut self, channel: Channel, register: u8) -> Result<u8, Self::Error> {
        let command = [reg::SPI_READ | reg::subaddress(register, channel)];
        let mut value = [0u8];
        self.spi.transaction(&mut [
            Operation::Write(&command),
            Operation::Read(&mut value),
        ])?;
        Ok(value[0])
    }

    fn write_register(
        &mut self,
        channel: Channel,
        register: u8,
        value: u8,
    ) -> Result<(), Self::Error> {
        self.spi.write(&[reg::subaddress(register, channel), value])
    }

    fn read_fifo(&mut self, channel: Channel, buf: &mut [u8]) -> Result<(), Self::Error> {
        debug_assert!(buf.len() <= Self::MAX_READ_CHUNK);
        let command = [reg::SPI_READ | reg::subaddress(reg::RHR, channel)];
        self.spi.transaction(&mut [Operation::Write(&command), Operation::Read(buf)])
    }

    fn write_fifo(&mut self, channel: Channel, buf: &[u8]) -> Result<(), Self::Error> {
        debug_assert!(buf.len() <= Self::MAX_WRITE_CHUNK);
        let command = [reg::subaddress(reg::THR, channel)];
        self.spi.transaction(&mut [Operation::Write(&command), Operation::Write(buf)])
    }
}
