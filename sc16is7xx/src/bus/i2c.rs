use embedded_hal::i2c::{I2c, Operation};

use super::Bus;
use crate::registers::{self as reg, Channel};

/// SC16IS7xx attached over I2C.
///
/// The 7-bit address is set by the A1/A0 straps:
///
/// | A1 | A0 | Index | Address |
/// |----|----|-------|---------|
/// | VDD | VDD | 0 | 0x48 |
/// | VDD | GND | 1 | 0x49 |
/// | VDD | SCL | 2 | 0x4A |
/// | VDD | SDA | 3 | 0x4B |
/// | GND | VDD | 4 | 0x4C |
/// | GND | GND | 5 | 0x4D |
/// | … | … | … | … |
/// | SDA | SDA | 15 | 0x57 |
///
/// The datasheet lists 8-bit addresses (0x90…); halve them.
pub struct I2cBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> I2cBus<I2C> {
    /// Address with both straps tied to VDD.
    pub const DEFAULT_ADDRESS: u8 = reg::I2C_ADDR_BASE;

    /// Create a transport at [`DEFAULT_ADDRESS`](Self::DEFAULT_ADDRESS).
    pub fn new(i2c: I2C) -> Self {
        Self::new_with_address(i2c, Self::DEFAULT_ADDRESS)
    }

    /// Create a transport at a 7-bit address, or at a strap index when
    /// `address` is below 16.
    pub fn new_with_address(i2c: I2C, address: u8) -> Self {
        let address = if address < reg::I2C_ADDR_COUNT {
            reg::I2C_ADDR_BASE + address
        } else {
            address
        };
        Self { i2c, address }
    }

    /// 7-bit address in use.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Consume the transport and return the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> Bus for I2cBus<I2C> {
    type Error = I2C::Error;

    const MAX_READ_CHUNK: usize = 32;
    // One byte of the 32-byte controller buffer goes to the sub-address.
    const MAX_WRITE_CHUNK: usize = 31;

    fn read_register(&mut self, channel: Channel, register: u8) -> Result<u8, Self::Error> {
        let mut value = [0u8];
        self.i2c
            .write_read(self.address, &[reg::subaddress(register, channel)], &mut value)?;
        Ok(value[0])
    }

    fn write_register(
        &mut self,
        channel: Channel,
        register: u8,
        value: u8,
    ) -> Result<(), Self::Error> {
        self.i2c
            .write(self.address, &[reg::subaddress(register, channel), value])
    }

    fn read_fifo(&mut self, channel: Channel, buf: &mut [u8]) -> Result<(), Self::Error> {
        debug_assert!(buf.len() <= Self::MAX_READ_CHUNK);
        self.i2c
            .write_read(self.address, &[reg::subaddress(reg::RHR, channel)], buf)
    }

    fn write_fifo(&mut self, channel: Channel, buf: &[u8]) -> Result<(), Self::Error> {
        debug_assert!(buf.len() <= Self::MAX_WRITE_CHUNK);
        // Back-to-back writes in one transaction share a single START.
        let subaddress = [reg::subaddress(reg::THR, channel)];
        self.i2c.transaction(
            self.address,
            &mut [Operation::Write(&subaddress), Operation::Write(buf)],
        )
    }
}
