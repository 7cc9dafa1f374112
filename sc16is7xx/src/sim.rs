//! Register-level SC16IS7xx simulation for tests.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, InputPin};

use crate::bus::Bus;
use crate::registers::{self as reg, Channel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

/// What the simulated chip has seen and will report.
pub struct SimState {
    /// Every register write, in order.
    pub writes: Vec<(Channel, u8, u8)>,
    /// General-bank register file per channel.
    pub registers: [[u8; 16]; 2],
    /// Bytes waiting in each RX FIFO.
    pub rx: [VecDeque<u8>; 2],
    /// Bytes sent through each TX FIFO.
    pub tx: [Vec<u8>; 2],
    pub tx_free: [usize; 2],
    /// TX FIFO bytes shifted out per TXLVL read. 64 = instant.
    pub tx_drain_per_poll: usize,
    /// IIR values to report, front first. Empty reads as "none pending".
    pub iir: [VecDeque<u8>; 2],
    pub fifo_reads: Vec<usize>,
    pub fifo_writes: Vec<usize>,
    /// Fail every transaction.
    pub fail: bool,
}

impl SimState {
    fn new() -> Self {
        let mut registers = [[0u8; 16]; 2];
        for file in registers.iter_mut() {
            file[reg::IER as usize] = reg::POR_IER;
            file[reg::LCR as usize] = reg::POR_LCR;
        }
        SimState {
            writes: Vec::new(),
            registers,
            rx: [VecDeque::new(), VecDeque::new()],
            tx: [Vec::new(), Vec::new()],
            tx_free: [reg::FIFO_SIZE; 2],
            tx_drain_per_poll: reg::FIFO_SIZE,
            iir: [VecDeque::new(), VecDeque::new()],
            fifo_reads: Vec::new(),
            fifo_writes: Vec::new(),
            fail: false,
        }
    }

    /// Register writes to `channel`, as `(register, value)`.
    pub fn writes_to(&self, channel: Channel) -> Vec<(u8, u8)> {
        self.writes
            .iter()
            .filter(|(ch, _, _)| *ch == channel)
            .map(|(_, register, value)| (*register, *value))
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.fifo_reads.clear();
        self.fifo_writes.clear();
    }

    pub fn inject_rx(&mut self, channel: Channel, data: &[u8]) {
        self.rx[channel.index()].extend(data.iter().copied());
    }

    fn lcr(&self, channel: Channel) -> u8 {
        self.registers[channel.index()][reg::LCR as usize]
    }

    fn general_bank(&self, channel: Channel) -> bool {
        self.lcr(channel) & reg::LCR_DIVISOR_LATCH == 0
    }

    fn loopback(&self, channel: Channel) -> bool {
        self.registers[channel.index()][reg::MCR as usize] & reg::MCR_LOOPBACK != 0
    }

    fn transmit(&mut self, channel: Channel, data: &[u8]) {
        let ch = channel.index();
        self.tx_free[ch] = self.tx_free[ch].saturating_sub(data.len());
        if self.loopback(channel) {
            self.rx[ch].extend(data.iter().copied());
        } else {
            self.tx[ch].extend_from_slice(data);
        }
    }
}

/// Simulated chip with configurable per-transfer chunk limits.
pub struct SimBus<const READ: usize = 64, const WRITE: usize = 64> {
    state: Arc<Mutex<SimState>>,
}

pub type SimI2c = SimBus<32, 31>;

impl<const READ: usize, const WRITE: usize> SimBus<READ, WRITE> {
    pub fn new() -> (Self, Arc<Mutex<SimState>>) {
        let state = Arc::new(Mutex::new(SimState::new()));
        (
            SimBus {
                state: Arc::clone(&state),
            },
            state,
        )
    }

    fn state(&self) -> Result<MutexGuard<'_, SimState>, SimError> {
        let state = self.state.lock().map_err(|_| SimError)?;
        if state.fail {
            return Err(SimError);
        }
        Ok(state)
    }
}

impl<const READ: usize, const WRITE: usize> Bus for SimBus<READ, WRITE> {
    type Error = SimError;

    const MAX_READ_CHUNK: usize = READ;
    const MAX_WRITE_CHUNK: usize = WRITE;

    fn read_register(&mut self, channel: Channel, register: u8) -> Result<u8, SimError> {
        let mut state = self.state()?;
        let ch = channel.index();
        let general = state.general_bank(channel);
        let value = match register {
            reg::RXLVL => state.rx[ch].len().min(reg::FIFO_SIZE) as u8,
            reg::TXLVL => {
                let drained = state.tx_free[ch] + state.tx_drain_per_poll;
                state.tx_free[ch] = drained.min(reg::FIFO_SIZE);
                state.tx_free[ch] as u8
            }
            reg::IIR if state.lcr(channel) != reg::LCR_ENHANCED_BANK => {
                state.iir[ch].pop_front().unwrap_or(reg::POR_IIR)
            }
            reg::RHR if general => state.rx[ch].pop_front().unwrap_or(0),
            other => state.registers[ch][other as usize],
        };
        Ok(value)
    }

    fn write_register(&mut self, channel: Channel, register: u8, value: u8) -> Result<(), SimError> {
        let mut state = self.state()?;
        let ch = channel.index();
        state.writes.push((channel, register, value));
        let general = state.general_bank(channel);
        match register {
            reg::LCR => state.registers[ch][reg::LCR as usize] = value,
            reg::FCR if state.lcr(channel) != reg::LCR_ENHANCED_BANK => {
                if value & reg::FCR_RX_RESET != 0 {
                    state.rx[ch].clear();
                }
                if value & reg::FCR_TX_RESET != 0 {
                    state.tx_free[ch] = reg::FIFO_SIZE;
                }
            }
            reg::THR if general => state.transmit(channel, &[value]),
            other if general => state.registers[ch][other as usize] = value,
            _ => {}
        }
        Ok(())
    }

    fn read_fifo(&mut self, channel: Channel, buf: &mut [u8]) -> Result<(), SimError> {
        assert!(buf.len() <= READ, "read of {} exceeds chunk limit", buf.len());
        let mut state = self.state()?;
        for byte in buf.iter_mut() {
            *byte = state.rx[channel.index()].pop_front().unwrap_or(0);
        }
        state.fifo_reads.push(buf.len());
        Ok(())
    }

    fn write_fifo(&mut self, channel: Channel, data: &[u8]) -> Result<(), SimError> {
        assert!(data.len() <= WRITE, "write of {} exceeds chunk limit", data.len());
        let mut state = self.state()?;
        state.transmit(channel, data);
        state.fifo_writes.push(data.len());
        Ok(())
    }
}

/// IRQ line of the simulated chip: low while any IIR value is queued.
pub struct SimIrq {
    state: Arc<Mutex<SimState>>,
}

impl SimIrq {
    pub fn new(state: &Arc<Mutex<SimState>>) -> Self {
        SimIrq {
            state: Arc::clone(state),
        }
    }
}

impl ErrorType for SimIrq {
    type Error = Infallible;
}

impl InputPin for SimIrq {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        let state = self.state.lock().unwrap();
        Ok(state.iir.iter().any(|queue| !queue.is_empty()))
    }
}
