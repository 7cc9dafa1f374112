//! # sc16is7xx
//!
//! A `no_std` driver for the NXP SC16IS7xx family of SPI/I2C UART bridges
//! (SC16IS740/750/760 single-channel, SC16IS752/762 dual-channel), generic
//! over [`embedded-hal`](embedded_hal) 1.0 bus traits.
//!
//! Each UART channel looks like a byte stream. The driver hides the chip's
//! overlapped register banks, clamps bulk transfers to what the bus can
//! carry, and can decouple the application from the chip's 64-byte RX FIFO
//! with a software ring buffer filled in the background.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Registers | [`registers`] / [`options`] | Register map, bank values, line-format option word |
//! | Transport | [`bus`] | [`Bus`] trait, [`SpiBus`] and [`I2cBus`] |
//! | Buffering | [`ring_buffer`] | SPSC byte ring buffer with zero-copy fill |
//! | Port | [`port`] | `begin`, read/write/peek/flush, IIR dispatch |
//! | Interrupts | [`interrupt`] | [`InterruptCause`] decoding, handler table |
//! | Background | [`worker`] | Job list run by [`Sc16is7xx::tick`] |
//! | Chip | [`chip`] | [`Sc16is7x0`] / [`Sc16is7x2`] facades |
//!
//! ## Quick start
//!
//! ```ignore
//! use core::fmt::Write;
//! use sc16is7xx::{I2cBus, Options, Sc16is7x2};
//!
//! let mut uart = Sc16is7x2::new(I2cBus::new_with_address(i2c, 0));
//! uart.a_mut().begin(115_200, Options::MODE_8N1)?;
//! uart.b_mut().with_buffered_read(512)?;
//! uart.b_mut().begin(9_600, Options::MODE_8E1 | Options::FLOW_CONTROL_RTS_CTS)?;
//!
//! writeln!(uart.a(), "ready")?;
//!
//! // Every millisecond, from a timer task:
//! uart.tick();
//!
//! let mut buf = [0u8; 64];
//! let n = uart.b().read(&mut buf)?;
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `embedded-io` | yes | `embedded_io` `Read`/`Write` for port handles |
//! | `std` | no | `spawn_worker()` thread runner, `critical-section/std` |
//!
//! The test build always has `std`, so `spawn_worker()` is compiled and
//! tested by a plain `cargo test`.
//!
//! ## Chip parameters
//!
//! - **FIFO depth:** 64 bytes each way ([`registers::FIFO_SIZE`])
//! - **Default oscillator:** 1.8432 MHz ([`registers::DEFAULT_OSCILLATOR_HZ`])
//! - **Bus chunks:** SPI 64/64, I2C 32 read / 31 write

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod registers;
pub mod options;
pub mod error;
pub mod ring_buffer;
pub mod bus;
pub mod interrupt;
pub mod worker;
pub mod port;
pub mod chip;

#[cfg(test)]
mod sim;


pub use bus::{Bus, I2cBus, SpiBus};
pub use chip::{NoIrq, Sc16is7x0, Sc16is7x2, Sc16is7xx};
pub use error::Error;
pub use interrupt::{InterruptCause, InterruptHandler};
pub use options::{DataBits, FlowControl, Options, Parity, StopBits};
pub use port::{PortMut, PortRef, Shadow};
pub use registers::Channel;
pub use ring_buffer::RingBuffer;
pub use worker::{Job, Scheduler};
