//! SC16IS7xx register addresses and bitfield definitions.
//!
//! Register addresses are 4-bit and every register holds 8 bits. Several
//! addresses are overlapped and resolve to a different register depending on
//! the current LCR value (the "bank"):
//!
//! | LCR value | Bank | 0x00 | 0x01 | 0x02 | 0x04–0x07 |
//! |-----------|------|------|------|------|-----------|
//! | bit 7 = 0 | general | RHR/THR | IER | IIR/FCR | MCR, LSR, MSR/TCR, SPR/TLR |
//! | bit 7 = 1, ≠ 0xBF | divisor latch | DLL | DLH | IIR/FCR | as general |
//! | 0xBF | enhanced | DLL | DLH | EFR | XON1, XON2, XOFF1, XOFF2 |
//!
//! TCR and TLR replace MSR and SPR only while MCR bit 2 is set, and MCR bit 2
//! is only writable while EFR bit 4 is set.

// Several registers and bits are listed for completeness (GPIO block,
// Xon/Xoff characters) but the driver does not touch them.
#![allow(dead_code)]

// ── Channels and addressing ────────────────────────────────────────────────

/// UART channel within the chip.
///
/// Single-channel parts (SC16IS740/750/760) only have [`Channel::A`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Channel A, the only channel on single-UART parts.
    A = 0,
    /// Channel B, present on SC16IS752/762.
    B = 1,
}

impl Channel {
    /// Channel by port index (0 = A, anything else = B).
    pub const fn from_index(index: usize) -> Self {
        if index == 0 {
            Channel::A
        } else {
            Channel::B
        }
    }

    /// Port index of this channel.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Read flag in the SPI command byte. I2C signals direction in the address.
pub const SPI_READ: u8 = 0x80;

/// Register sub-address byte: `reg << 3 | channel << 1`. Bit 0 is unused.
pub const fn subaddress(register: u8, channel: Channel) -> u8 {
    ((register & 0x0F) << 3) | ((channel as u8) << 1)
}

// ── I2C addresses ──────────────────────────────────────────────────────────

/// Lowest 7-bit I2C address (A1 = VDD, A0 = VDD).
pub const I2C_ADDR_BASE: u8 = 0x48;

/// Number of addresses selectable with the A1/A0 straps.
pub const I2C_ADDR_COUNT: u8 = 16;

// ── General register bank ──────────────────────────────────────────────────

/// Receive holding register (read) / transmit holding register (write).
pub const RHR: u8 = 0x00;
pub const THR: u8 = 0x00;

/// Interrupt enable register.
/// - Bit 7 — CTS interrupt
/// - Bit 6 — RTS interrupt
/// - Bit 5 — Xoff interrupt
/// - Bit 4 — sleep mode
/// - Bit 3 — modem status interrupt
/// - Bit 2 — receive line status interrupt
/// - Bit 1 — THR interrupt
/// - Bit 0 — RHR interrupt
pub const IER: u8 = 0x01;

/// FIFO control register (write only).
/// - Bits 7:6 — RX trigger (overridden by TLR when TLR ≠ 0)
/// - Bits 5:4 — TX trigger
/// - Bit 2 — reset TX FIFO
/// - Bit 1 — reset RX FIFO
/// - Bit 0 — FIFO enable
pub const FCR: u8 = 0x02;

/// Interrupt identification register (read only, same address as FCR).
/// - Bits 5:0 — interrupt source, bit 0 = 1 means nothing pending
pub const IIR: u8 = 0x02;

/// Line control register; also selects the register bank.
/// - Bit 7 — divisor latch enable
/// - Bit 6 — break control
/// - Bit 5 — forced parity
/// - Bit 4 — even parity
/// - Bit 3 — parity enable
/// - Bit 2 — stop bits (0 = 1, 1 = 1.5/2)
/// - Bits 1:0 — word length (0 = 5 … 3 = 8)
pub const LCR: u8 = 0x03;

/// Modem control register.
/// - Bit 4 — loopback enable
/// - Bit 2 — TCR/TLR enable (writable only with EFR bit 4 set)
/// - Bit 1 — RTS
/// - Bit 0 — DTR
pub const MCR: u8 = 0x04;

/// Line status register (read only).
pub const LSR: u8 = 0x05;

/// Modem status register (read only, MCR bit 2 clear).
pub const MSR: u8 = 0x06;

/// Transmission control register (MCR bit 2 set).
/// - Bits 7:4 — resume trigger, 4-character granularity
/// - Bits 3:0 — halt trigger, 4-character granularity
pub const TCR: u8 = 0x06;

/// Scratchpad register (MCR bit 2 clear).
pub const SPR: u8 = 0x07;

/// Trigger level register (MCR bit 2 set).
/// - Bits 7:4 — RX FIFO trigger, 4-character granularity
/// - Bits 3:0 — TX FIFO trigger, 4-character granularity
pub const TLR: u8 = 0x07;

/// Free space in the transmit FIFO (read only).
pub const TXLVL: u8 = 0x08;

/// Bytes waiting in the receive FIFO (read only).
pub const RXLVL: u8 = 0x09;

/// GPIO direction, state and interrupt enable.
pub const IODIR: u8 = 0x0A;
pub const IOSTATE: u8 = 0x0B;
pub const IOINTENA: u8 = 0x0C;

/// I/O control.
/// - Bit 3 — software reset
/// - Bit 1 — GPIO[7:4] as modem pins
/// - Bit 0 — I/O latch
pub const IOCONTROL: u8 = 0x0E;

/// Extra features control register.
pub const EFCR: u8 = 0x0F;

// ── Special (divisor latch) bank ───────────────────────────────────────────

/// Divisor latch low byte.
pub const DLL: u8 = 0x00;

/// Divisor latch high byte.
pub const DLH: u8 = 0x01;

// ── Enhanced bank ──────────────────────────────────────────────────────────

/// Enhanced features register.
/// - Bit 7 — auto CTS
/// - Bit 6 — auto RTS
/// - Bit 4 — enhanced functions enable
/// - Bits 3:0 — software flow control mode
pub const EFR: u8 = 0x02;

pub const XON1: u8 = 0x04;
pub const XON2: u8 = 0x05;
pub const XOFF1: u8 = 0x06;
pub const XOFF2: u8 = 0x07;

// ── LCR bank select values ─────────────────────────────────────────────────

/// LCR value that exposes the enhanced bank (EFR, XON/XOFF).
pub const LCR_ENHANCED_BANK: u8 = 0xBF;

/// LCR bit 7: divisor latch enable.
pub const LCR_DIVISOR_LATCH: u8 = 0x80;

/// LCR bits that carry the line format (word length, stop bits, parity).
pub const LCR_FORMAT_MASK: u8 = 0x3F;

// ── Bitfields ──────────────────────────────────────────────────────────────

pub const IER_RHR: u8 = 1 << 0;
pub const IER_THR: u8 = 1 << 1;
pub const IER_LINE_STATUS: u8 = 1 << 2;
pub const IER_MODEM_STATUS: u8 = 1 << 3;
pub const IER_SLEEP: u8 = 1 << 4;
pub const IER_XOFF: u8 = 1 << 5;
pub const IER_RTS: u8 = 1 << 6;
pub const IER_CTS: u8 = 1 << 7;

pub const FCR_FIFO_ENABLE: u8 = 1 << 0;
pub const FCR_RX_RESET: u8 = 1 << 1;
pub const FCR_TX_RESET: u8 = 1 << 2;

pub const MCR_DTR: u8 = 1 << 0;
pub const MCR_RTS: u8 = 1 << 1;
pub const MCR_TCR_TLR_ENABLE: u8 = 1 << 2;
pub const MCR_LOOPBACK: u8 = 1 << 4;

pub const EFR_ENHANCED_FUNCTIONS: u8 = 1 << 4;
pub const EFR_AUTO_RTS: u8 = 1 << 6;
pub const EFR_AUTO_CTS: u8 = 1 << 7;

pub const IOCONTROL_SOFTWARE_RESET: u8 = 1 << 3;

/// IIR bit 0: no interrupt pending.
pub const IIR_NONE_PENDING: u8 = 0x01;

/// IIR bits that identify the interrupt source.
pub const IIR_SOURCE_MASK: u8 = 0x3F;

// ── Sizes and defaults ─────────────────────────────────────────────────────

/// Hardware FIFO depth, both directions.
pub const FIFO_SIZE: usize = 64;

/// Default crystal: 1.8432 MHz.
pub const DEFAULT_OSCILLATOR_HZ: u32 = 1_843_200;

/// Auto-RTS halt level (bytes in RX FIFO) used when hardware flow is on.
pub const DEFAULT_FLOW_HALT_LEVEL: u8 = 60;

/// Auto-RTS resume level.
pub const DEFAULT_FLOW_RESUME_LEVEL: u8 = 30;

/// Default RX FIFO interrupt trigger level in IRQ mode.
pub const DEFAULT_RX_TRIGGER_LEVEL: u8 = 16;

/// Smallest and largest RX trigger levels TLR can encode.
pub const MIN_TRIGGER_LEVEL: u8 = 4;
pub const MAX_TRIGGER_LEVEL: u8 = 60;

// ── Power-on reset values ──────────────────────────────────────────────────

pub const POR_IER: u8 = 0x00;
pub const POR_IIR: u8 = 0x01;
pub const POR_LCR: u8 = 0x1D;

// ── Encoders ───────────────────────────────────────────────────────────────

/// Baud rate divisor: `oscillator / (baud × 16)`, truncated.
///
/// Returns `None` for a zero baud rate or a divisor outside `1..=0xFFFF`.
/// Rates that do not divide evenly are accepted with whatever error the
/// truncation produces.
pub fn divisor(oscillator_hz: u32, baud_rate: u32) -> Option<u16> {
    let denominator = baud_rate.checked_mul(16)?;
    if denominator == 0 {
        return None;
    }
    match oscillator_hz / denominator {
        0 => None,
        d => u16::try_from(d).ok(),
    }
}

/// TCR value for the given halt and resume levels (bytes).
pub const fn tcr(halt: u8, resume: u8) -> u8 {
    (((resume / 4) & 0x0F) << 4) | ((halt / 4) & 0x0F)
}

/// Clamp an RX trigger level to what TLR can express.
pub fn clamp_trigger_level(level: u8) -> u8 {
    level.clamp(MIN_TRIGGER_LEVEL, MAX_TRIGGER_LEVEL)
}

/// TLR value selecting `level` as the RX FIFO trigger (TX trigger left 0).
pub fn tlr_rx_trigger(level: u8) -> u8 {
    (clamp_trigger_level(level) / 4) << 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subaddress_places_register_and_channel() {
        assert_eq!(subaddress(RHR, Channel::A), 0x00);
        assert_eq!(subaddress(LCR, Channel::A), 0x18);
        assert_eq!(subaddress(RXLVL, Channel::B), 0x4A);
        assert_eq!(subaddress(EFCR, Channel::B), 0x7A);
        assert_eq!(SPI_READ | subaddress(TXLVL, Channel::A), 0xC0);
    }

    #[test]
    fn divisor_for_default_crystal() {
        assert_eq!(divisor(DEFAULT_OSCILLATOR_HZ, 9600), Some(12));
        assert_eq!(divisor(DEFAULT_OSCILLATOR_HZ, 115_200), Some(1));
        assert_eq!(divisor(DEFAULT_OSCILLATOR_HZ, 300), Some(384));
    }

    #[test]
    fn divisor_truncates_inexact_ratios() {
        // 1843200 / (38400 * 16) = 3 exactly; 14.7456 MHz / (57600 * 16) = 16
        assert_eq!(divisor(DEFAULT_OSCILLATOR_HZ, 38_400), Some(3));
        assert_eq!(divisor(14_745_600, 57_600), Some(16));
        // 1843200 / (50000 * 16) = 2.304
        assert_eq!(divisor(DEFAULT_OSCILLATOR_HZ, 50_000), Some(2));
    }

    #[test]
    fn divisor_rejects_out_of_range() {
        assert_eq!(divisor(DEFAULT_OSCILLATOR_HZ, 0), None);
        assert_eq!(divisor(DEFAULT_OSCILLATOR_HZ, 230_400), None);
        assert_eq!(divisor(u32::MAX, 1), None);
        assert_eq!(divisor(DEFAULT_OSCILLATOR_HZ, u32::MAX), None);
    }

    #[test]
    fn tcr_default_levels() {
        // resume 30 → 7, halt 60 → 15
        assert_eq!(tcr(DEFAULT_FLOW_HALT_LEVEL, DEFAULT_FLOW_RESUME_LEVEL), 0x7F);
    }

    #[test]
    fn tlr_clamps_trigger_level() {
        assert_eq!(tlr_rx_trigger(16), 0x40);
        assert_eq!(tlr_rx_trigger(0), 0x10);
        assert_eq!(tlr_rx_trigger(64), 0xF0);
        assert_eq!(tlr_rx_trigger(255), 0xF0);
    }

    #[test]
    fn channel_index_round_trip() {
        assert_eq!(Channel::from_index(0), Channel::A);
        assert_eq!(Channel::from_index(1), Channel::B);
        assert_eq!(Channel::B.index(), 1);
    }
}
