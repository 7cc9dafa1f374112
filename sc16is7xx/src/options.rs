//! Line format and flow-control option word passed to `begin`.
//!
//! The low six bits use the LCR encoding directly (word length, stop bits,
//! parity) so they can be written to the chip verbatim. The top two bits
//! select hardware flow control and are a driver convention; they map onto
//! the EFR auto-RTS/auto-CTS bits and are never written to LCR.

use core::ops::BitOr;

use crate::registers as reg;

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five = 0,
    Six = 1,
    Seven = 2,
    Eight = 3,
}

/// Number of stop bits (`Two` means 1.5 for 5-bit words).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One = 0,
    Two = 1,
}

/// Parity mode, encoded as LCR bits 5:3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None = 0b000,
    Odd = 0b001,
    Even = 0b011,
    /// Parity bit forced to 1.
    Mark = 0b101,
    /// Parity bit forced to 0.
    Space = 0b111,
}

/// Hardware flow-control selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None = 0b00,
    /// Chip drives RTS from its RX FIFO level.
    Rts = 0b01,
    /// Chip gates its transmitter on CTS.
    Cts = 0b10,
    RtsCts = 0b11,
}

/// Packed line format and flow-control selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options(u8);

impl Options {
    pub const MODE_8N1: Options = Options::new(DataBits::Eight, Parity::None, StopBits::One);
    pub const MODE_8E1: Options = Options::new(DataBits::Eight, Parity::Even, StopBits::One);
    pub const MODE_8O1: Options = Options::new(DataBits::Eight, Parity::Odd, StopBits::One);
    pub const MODE_8N2: Options = Options::new(DataBits::Eight, Parity::None, StopBits::Two);
    pub const MODE_8E2: Options = Options::new(DataBits::Eight, Parity::Even, StopBits::Two);
    pub const MODE_8O2: Options = Options::new(DataBits::Eight, Parity::Odd, StopBits::Two);
    pub const MODE_7E1: Options = Options::new(DataBits::Seven, Parity::Even, StopBits::One);
    pub const MODE_7O1: Options = Options::new(DataBits::Seven, Parity::Odd, StopBits::One);
    pub const MODE_7E2: Options = Options::new(DataBits::Seven, Parity::Even, StopBits::Two);
    pub const MODE_7O2: Options = Options::new(DataBits::Seven, Parity::Odd, StopBits::Two);

    pub const FLOW_CONTROL_RTS: Options = Options((FlowControl::Rts as u8) << 6);
    pub const FLOW_CONTROL_CTS: Options = Options((FlowControl::Cts as u8) << 6);
    pub const FLOW_CONTROL_RTS_CTS: Options = Options((FlowControl::RtsCts as u8) << 6);

    /// Line format without flow control.
    pub const fn new(data: DataBits, parity: Parity, stop: StopBits) -> Self {
        Options((data as u8) | ((stop as u8) << 2) | ((parity as u8) << 3))
    }

    /// Raw option word.
    pub const fn from_bits(bits: u8) -> Self {
        Options(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Same line format with a different flow-control selection.
    pub const fn with_flow_control(self, flow: FlowControl) -> Self {
        Options((self.0 & reg::LCR_FORMAT_MASK) | ((flow as u8) << 6))
    }

    /// LCR value for this format, with the divisor latch and bank bits clear.
    pub const fn lcr(self) -> u8 {
        self.0 & reg::LCR_FORMAT_MASK
    }

    pub const fn flow_control(self) -> FlowControl {
        match self.0 >> 6 {
            0b00 => FlowControl::None,
            0b01 => FlowControl::Rts,
            0b10 => FlowControl::Cts,
            _ => FlowControl::RtsCts,
        }
    }

    /// EFR auto-RTS/auto-CTS bits for the selected flow control.
    pub const fn efr_flow_bits(self) -> u8 {
        let mut bits = 0;
        if self.0 & Self::FLOW_CONTROL_RTS.0 != 0 {
            bits |= reg::EFR_AUTO_RTS;
        }
        if self.0 & Self::FLOW_CONTROL_CTS.0 != 0 {
            bits |= reg::EFR_AUTO_CTS;
        }
        bits
    }

    pub const fn uses_hardware_flow(self) -> bool {
        self.0 >> 6 != 0
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::MODE_8N1
    }
}

impl BitOr for Options {
    type Output = Options;

    fn bitor(self, rhs: Options) -> Options {
        Options(self.0 | rhs.0)
    }
}
