//! Bus transports for the SC16IS7xx.
//!
//! The chip speaks the same register protocol over SPI and I2C; only the
//! framing of the sub-address byte and the per-transfer byte budget differ.
//! [`Bus`] hides both behind register and FIFO primitives.
//!
//! | Transport | Read chunk | Write chunk |
//! |-----------|------------|-------------|
//! | [`SpiBus`] | 64 | 64 |
//! | [`I2cBus`] | 32 | 31 |
//!
//! Each method is one bus transaction. The underlying `embedded-hal` driver
//! provides the per-transaction lock (chip select for SPI, a START/STOP frame
//! for I2C); the chip driver serialises callers on top of that.

mod i2c;
mod spi;

pub use i2c::I2cBus;
pub use spi::SpiBus;

use crate::registers::Channel;

/// Register-level access to one SC16IS7xx.
pub trait Bus {
    /// Transport error type.
    type Error: core::fmt::Debug;

    /// Largest FIFO read a single transaction can carry.
    const MAX_READ_CHUNK: usize;

    /// Largest FIFO write a single transaction can carry. Port writes never
    /// exceed the 64-byte TX FIFO, whatever this says.
    const MAX_WRITE_CHUNK: usize;

    /// Read one control register.
    fn read_register(&mut self, channel: Channel, register: u8) -> Result<u8, Self::Error>;

    /// Write one control register.
    fn write_register(&mut self, channel: Channel, register: u8, value: u8)
        -> Result<(), Self::Error>;

    /// Fill `buf` from the receive FIFO. `buf` must not exceed
    /// [`MAX_READ_CHUNK`](Self::MAX_READ_CHUNK).
    fn read_fifo(&mut self, channel: Channel, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Push `buf` into the transmit FIFO. `buf` must not exceed
    /// [`MAX_WRITE_CHUNK`](Self::MAX_WRITE_CHUNK).
    fn write_fifo(&mut self, channel: Channel, buf: &[u8]) -> Result<(), Self::Error>;
}
