//! One UART channel of the chip.
//!
//! A [`Port`] holds per-channel state (register shadows, the receive ring
//! buffer, interrupt handlers). It never talks to the bus on its own: the
//! chip hands out [`PortRef`] (shared, for I/O) and [`PortMut`] (exclusive,
//! for configuration) handles that pair a port with the chip's interface.
//!
//! Configuration must finish before concurrent I/O starts. After that, one
//! application context may use the read/write API while the worker drains
//! the receive FIFO into the ring buffer.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use log::{debug, warn};

use crate::bus::Bus;
use crate::chip::Interface;
use crate::error::Error;
use crate::interrupt::{HandlerTable, InterruptCause};
use crate::options::Options;
use crate::registers::{self as reg, Channel};
use crate::ring_buffer::RingBuffer;
use crate::worker::{relax, Job};

/// Smallest ring buffer that can hold a received byte.
pub const MIN_BUFFER_CAPACITY: usize = 2;

/// Last values written to registers that cannot be read back as-is
/// (bank-dependent or write-only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Shadow {
    pub ier: u8,
    pub lcr: u8,
    pub efr: u8,
    pub mcr: u8,
    pub tcr: u8,
    pub tlr: u8,
}

/// Per-channel state.
pub struct Port {
    channel: Channel,
    shadow: Shadow,
    configured: bool,
    write_blocks_when_full: bool,
    rx_trigger_level: u8,
    /// Requested ring-buffer size; applied by `begin`.
    buffer_capacity: Option<usize>,
    rx_buffer: Option<RingBuffer>,
    /// Drain only after an RX interrupt (buffering set up with an IRQ pin).
    irq_gated: bool,
    /// Set by an RX interrupt, consumed by the drain job.
    data_available: AtomicBool,
    peek: Mutex<Cell<Option<u8>>>,
    handlers: HandlerTable,
}

impl Port {
    pub(crate) fn new(channel: Channel) -> Self {
        Port {
            channel,
            shadow: Shadow::default(),
            configured: false,
            write_blocks_when_full: true,
            rx_trigger_level: reg::DEFAULT_RX_TRIGGER_LEVEL,
            buffer_capacity: None,
            rx_buffer: None,
            irq_gated: false,
            data_available: AtomicBool::new(false),
            peek: Mutex::new(Cell::new(None)),
            handlers: HandlerTable::default(),
        }
    }

    /// Forget everything the chip lost in a reset.
    pub(crate) fn reset_state(&mut self) {
        self.shadow = Shadow::default();
        self.configured = false;
        self.peek.get_mut().set(None);
        self.data_available.store(false, Ordering::Relaxed);
    }

    fn take_peek(&self) -> Option<u8> {
        critical_section::with(|cs| self.peek.borrow(cs).take())
    }
}

// ── Configuration handle ───────────────────────────────────────────────────

/// Exclusive handle for configuring one port.
pub struct PortMut<'a, B, IRQ> {
    pub(crate) iface: &'a mut Interface<B, IRQ>,
    pub(crate) port: &'a mut Port,
}

impl<'a, B: Bus, IRQ> PortMut<'a, B, IRQ> {
    /// Program baud rate, line format and flow control, then reset both
    /// FIFOs.
    ///
    /// The register bank is overlapped, so the order below matters:
    /// 1. enhanced bank, EFR (enhanced functions + auto RTS/CTS)
    /// 2. general bank, MCR (and TCR/TLR when hardware flow is on)
    /// 3. enhanced bank again, EFR again
    /// 4. divisor latch, DLL/DLH, then LCR with the line format
    /// 5. IER = 0, FCR = FIFO enable + reset both
    /// 6. ring buffer and RX interrupt setup if buffering was requested
    ///
    /// May be called again to change baud rate or format.
    pub fn begin(&mut self, baud_rate: u32, options: Options) -> Result<(), Error<B::Error>> {
        let divisor = reg::divisor(self.iface.oscillator_hz(), baud_rate)
            .ok_or(Error::InvalidBaudRate(baud_rate))?;
        debug!(
            "port {:?}: begin {} baud, options {:#04x}, divisor {}",
            self.port.channel,
            baud_rate,
            options.bits(),
            divisor
        );

        let efr = reg::EFR_ENHANCED_FUNCTIONS | options.efr_flow_bits();
        self.set(reg::LCR, reg::LCR_ENHANCED_BANK)?;
        self.set(reg::EFR, efr)?;

        // at LCR = 0xBF address 4 is XON1, not MCR; leave the enhanced bank
        self.set(reg::LCR, options.lcr())?;
        if options.uses_hardware_flow() {
            let tcr = reg::tcr(reg::DEFAULT_FLOW_HALT_LEVEL, reg::DEFAULT_FLOW_RESUME_LEVEL);
            self.set(reg::MCR, reg::MCR_TCR_TLR_ENABLE)?;
            self.set(reg::TCR, tcr)?;
            self.set(reg::TLR, 0)?;
            self.port.shadow.mcr = reg::MCR_TCR_TLR_ENABLE;
            self.port.shadow.tcr = tcr;
        } else {
            self.set(reg::MCR, 0)?;
            self.port.shadow.mcr = 0;
        }
        self.port.shadow.tlr = 0;

        self.set(reg::LCR, reg::LCR_ENHANCED_BANK)?;
        self.set(reg::EFR, efr)?;
        self.port.shadow.efr = efr;

        self.set(reg::LCR, reg::LCR_DIVISOR_LATCH)?;
        self.set(reg::DLL, divisor as u8)?;
        self.set(reg::DLH, (divisor >> 8) as u8)?;
        self.set(reg::LCR, options.lcr())?;
        self.port.shadow.lcr = options.lcr();

        self.set(reg::IER, 0)?;
        self.port.shadow.ier = 0;

        self.set(
            reg::FCR,
            reg::FCR_FIFO_ENABLE | reg::FCR_RX_RESET | reg::FCR_TX_RESET,
        )?;

        self.port.peek.get_mut().set(None);
        self.port.data_available.store(false, Ordering::Relaxed);
        self.port.configured = true;

        if let Some(capacity) = self.port.buffer_capacity {
            self.enable_buffering(capacity)?;
        }

        let ier = self.port.shadow.ier | self.port.handlers.ier_bits();
        if ier != self.port.shadow.ier {
            self.write_ier(ier)?;
        }
        Ok(())
    }

    /// Buffer received bytes in a ring buffer of `capacity` bytes, filled by
    /// the worker.
    ///
    /// Takes effect immediately on a configured port, otherwise at the next
    /// [`begin()`](Self::begin). Calling it again reallocates the buffer and
    /// drops anything in it. One slot always stays empty, so capacities
    /// below [`MIN_BUFFER_CAPACITY`] are raised to it.
    pub fn with_buffered_read(&mut self, capacity: usize) -> Result<(), Error<B::Error>> {
        let capacity = if capacity < MIN_BUFFER_CAPACITY {
            warn!(
                "port {:?}: ring buffer of {} bytes raised to {}",
                self.port.channel, capacity, MIN_BUFFER_CAPACITY
            );
            MIN_BUFFER_CAPACITY
        } else {
            capacity
        };
        if self.port.buffer_capacity.is_some() {
            warn!(
                "port {:?}: buffered read already enabled, reallocating",
                self.port.channel
            );
        }
        self.port.buffer_capacity = Some(capacity);
        if self.port.configured {
            self.enable_buffering(capacity)?;
        }
        Ok(())
    }

    /// RX FIFO level that raises the RX interrupt in IRQ mode. Clamped to
    /// 4..=60 and rounded down to a multiple of 4.
    pub fn with_rx_fifo_trigger_level(&mut self, level: u8) -> &mut Self {
        let clamped = reg::clamp_trigger_level(level);
        if clamped != level {
            warn!(
                "port {:?}: RX trigger level {} clamped to {}",
                self.port.channel, level, clamped
            );
        }
        self.port.rx_trigger_level = clamped;
        self
    }

    /// Whether writes wait for TX FIFO space (default) or write only what
    /// fits.
    pub fn set_write_blocks_when_full(&mut self, blocks: bool) -> &mut Self {
        self.port.write_blocks_when_full = blocks;
        self
    }

    /// Internal loopback: TX is wired to RX inside the chip.
    pub fn set_loopback(&mut self, enable: bool) -> Result<(), Error<B::Error>> {
        let mcr = if enable {
            self.port.shadow.mcr | reg::MCR_LOOPBACK
        } else {
            self.port.shadow.mcr & !reg::MCR_LOOPBACK
        };
        self.set(reg::MCR, mcr)?;
        self.port.shadow.mcr = mcr;
        Ok(())
    }

    /// Run `handler` from the worker whenever `cause` is reported for this
    /// port. Replaces any earlier handler for the same cause and enables the
    /// matching IER bits once the port is configured.
    ///
    /// Handlers only run when the chip has an IRQ pin.
    pub fn on_interrupt<F>(&mut self, cause: InterruptCause, handler: F) -> Result<(), Error<B::Error>>
    where
        F: Fn(Channel, InterruptCause) + Send + Sync + 'static,
    {
        self.port.handlers.set(cause, alloc::boxed::Box::new(handler));
        if !self.iface.has_irq() {
            warn!(
                "port {:?}: {:?} handler registered without an IRQ pin",
                self.port.channel, cause
            );
            return Ok(());
        }
        self.iface.scheduler_mut().register(Job::PollIrq);
        if self.port.configured {
            let ier = self.port.shadow.ier | cause.ier_bits();
            if ier != self.port.shadow.ier {
                self.write_ier(ier)?;
            }
        }
        Ok(())
    }

    /// Remove the handler for `cause`. The IER bits stay as they are.
    pub fn clear_interrupt(&mut self, cause: InterruptCause) {
        self.port.handlers.clear(cause);
    }

    /// Shared handle for I/O on this port.
    pub fn handle(&self) -> PortRef<'_, B, IRQ> {
        PortRef {
            iface: &*self.iface,
            port: &*self.port,
        }
    }

    pub fn shadow(&self) -> Shadow {
        self.port.shadow
    }

    fn enable_buffering(&mut self, capacity: usize) -> Result<(), Error<B::Error>> {
        let mut buffer = self.port.rx_buffer.take().unwrap_or_default();
        if !buffer.init(capacity) {
            self.port.buffer_capacity = None;
            return Err(Error::BufferAlloc);
        }
        self.port.rx_buffer = Some(buffer);
        debug!(
            "port {:?}: buffered read, {} byte ring buffer",
            self.port.channel, capacity
        );

        self.port.irq_gated = self.iface.has_irq();
        if self.port.irq_gated {
            // TLR sits behind MCR bit 2 even without hardware flow control
            let mcr = self.port.shadow.mcr | reg::MCR_TCR_TLR_ENABLE;
            if mcr != self.port.shadow.mcr {
                self.set(reg::MCR, mcr)?;
                self.port.shadow.mcr = mcr;
            }
            let tlr = reg::tlr_rx_trigger(self.port.rx_trigger_level);
            self.set(reg::TLR, tlr)?;
            self.port.shadow.tlr = tlr;
            self.write_ier(self.port.shadow.ier | reg::IER_RHR)?;
            self.iface.scheduler_mut().register(Job::PollIrq);
        }
        self.iface
            .scheduler_mut()
            .register(Job::DrainReceive(self.port.channel));
        Ok(())
    }

    fn write_ier(&mut self, ier: u8) -> Result<(), Error<B::Error>> {
        self.set(reg::IER, ier)?;
        self.port.shadow.ier = ier;
        Ok(())
    }

    fn set(&self, register: u8, value: u8) -> Result<(), Error<B::Error>> {
        self.iface.write_register(self.port.channel, register, value)
    }
}

// ── I/O handle ─────────────────────────────────────────────────────────────

/// Shared handle for byte-stream I/O on one port.
pub struct PortRef<'a, B, IRQ> {
    pub(crate) iface: &'a Interface<B, IRQ>,
    pub(crate) port: &'a Port,
}

impl<B, IRQ> Clone for PortRef<'_, B, IRQ> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B, IRQ> Copy for PortRef<'_, B, IRQ> {}

impl<'a, B: Bus, IRQ> PortRef<'a, B, IRQ> {
    pub fn channel(&self) -> Channel {
        self.port.channel
    }

    /// Whether received bytes go through a ring buffer.
    pub fn is_buffered(&self) -> bool {
        self.port.rx_buffer.is_some()
    }

    pub fn write_blocks_when_full(&self) -> bool {
        self.port.write_blocks_when_full
    }

    pub fn shadow(&self) -> Shadow {
        self.port.shadow
    }

    /// Bytes ready to read. Costs one bus transaction unless buffered.
    pub fn available(&self) -> Result<usize, Error<B::Error>> {
        let peeked = critical_section::with(|cs| self.port.peek.borrow(cs).get()).is_some();
        let waiting = match &self.port.rx_buffer {
            Some(buffer) => buffer.available_to_read(),
            None => self.rx_level()?,
        };
        Ok(waiting + peeked as usize)
    }

    /// Free space in the chip's TX FIFO.
    pub fn available_for_write(&self) -> Result<usize, Error<B::Error>> {
        Ok(self.iface.read_register(self.port.channel, reg::TXLVL)? as usize)
    }

    /// Read one byte, or `None` if nothing has arrived. Never blocks.
    pub fn read_byte(&self) -> Result<Option<u8>, Error<B::Error>> {
        if let Some(byte) = self.port.take_peek() {
            return Ok(Some(byte));
        }
        self.fetch_byte()
    }

    /// Look at the next byte without consuming it.
    pub fn peek(&self) -> Result<Option<u8>, Error<B::Error>> {
        if let Some(byte) = critical_section::with(|cs| self.port.peek.borrow(cs).get()) {
            return Ok(Some(byte));
        }
        let byte = self.fetch_byte()?;
        critical_section::with(|cs| self.port.peek.borrow(cs).set(byte));
        Ok(byte)
    }

    /// Read up to `buf.len()` bytes. Never blocks; returns 0 when nothing
    /// has arrived.
    ///
    /// Unbuffered reads transfer at most one bus chunk per call.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error<B::Error>> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut count = 0;
        if let Some(byte) = self.port.take_peek() {
            buf[0] = byte;
            count = 1;
        }

        let rest = &mut buf[count..];
        match &self.port.rx_buffer {
            Some(buffer) => count += buffer.read(rest),
            None if !rest.is_empty() => {
                let len = rest.len().min(B::MAX_READ_CHUNK).min(self.rx_level()?);
                if len > 0 {
                    self.iface.read_fifo(self.port.channel, &mut rest[..len])?;
                    count += len;
                }
            }
            None => {}
        }
        Ok(count)
    }

    /// Write one byte. Returns `false` if the TX FIFO is full and the port
    /// does not block.
    pub fn write_byte(&self, byte: u8) -> Result<bool, Error<B::Error>> {
        loop {
            if self.available_for_write()? > 0 {
                self.iface.write_register(self.port.channel, reg::THR, byte)?;
                return Ok(true);
            }
            if !self.port.write_blocks_when_full {
                return Ok(false);
            }
            relax();
        }
    }

    /// Write `data` in chunks of at most `MAX_WRITE_CHUNK` bytes and never
    /// more than the 64-byte TX FIFO.
    ///
    /// A blocking port waits for room for each chunk and always writes all
    /// of `data`. A non-blocking port stops at the first chunk that does not
    /// fully fit; the return value says how much went out.
    pub fn write(&self, data: &[u8]) -> Result<usize, Error<B::Error>> {
        let mut written = 0;
        // TXLVL never reports more than the FIFO depth
        for chunk in data.chunks(B::MAX_WRITE_CHUNK.min(reg::FIFO_SIZE)) {
            let mut space = self.available_for_write()?;
            if self.port.write_blocks_when_full {
                while space < chunk.len() {
                    relax();
                    space = self.available_for_write()?;
                }
            }

            let len = chunk.len().min(space);
            if len > 0 {
                self.iface.write_fifo(self.port.channel, &chunk[..len])?;
                written += len;
            }
            if len < chunk.len() {
                break;
            }
        }
        Ok(written)
    }

    /// Wait until the TX FIFO is empty.
    pub fn flush(&self) -> Result<(), Error<B::Error>> {
        while self.available_for_write()? < reg::FIFO_SIZE {
            relax();
        }
        Ok(())
    }

    /// Read IIR and dispatch its cause.
    ///
    /// An RX cause on a buffered port also flags the drain job. Returns the
    /// decoded cause, `None` when nothing was pending or the code is unknown.
    pub fn handle_iir(&self) -> Result<Option<InterruptCause>, Error<B::Error>> {
        let iir = self.iface.read_register(self.port.channel, reg::IIR)?;
        let cause = match InterruptCause::from_iir(iir) {
            Ok(Some(cause)) => cause,
            Ok(None) => return Ok(None),
            Err(code) => {
                warn!("port {:?}: unknown IIR source {:#04x}", self.port.channel, code);
                return Ok(None);
            }
        };

        if cause.is_receive() && self.port.rx_buffer.is_some() {
            self.port.data_available.store(true, Ordering::Release);
        }
        self.port.handlers.dispatch(self.port.channel, cause);
        Ok(Some(cause))
    }

    /// Worker job: move the RX FIFO into the ring buffer.
    ///
    /// With an IRQ pin the drain only runs after an RX interrupt flagged
    /// data. Each fill region is read in bus transfers of at most
    /// `MAX_READ_CHUNK` bytes until the RX level seen at the start is
    /// consumed or the ring buffer is full. Returns the number of bytes
    /// buffered.
    pub(crate) fn drain_receive(&self) -> Result<usize, Error<B::Error>> {
        let Some(buffer) = &self.port.rx_buffer else {
            return Ok(0);
        };
        if self.port.irq_gated && !self.port.data_available.swap(false, Ordering::AcqRel) {
            return Ok(0);
        }

        let mut remaining = self.rx_level()?;
        if remaining == 0 {
            return Ok(0);
        }

        let mut failure = None;
        let mut stored = 0;
        while remaining > 0 && failure.is_none() {
            let filled = buffer.write_with(|region| {
                let len = region.len().min(remaining).min(B::MAX_READ_CHUNK);
                if len == 0 {
                    return 0;
                }
                match self.iface.read_fifo(self.port.channel, &mut region[..len]) {
                    Ok(()) => {
                        remaining -= len;
                        len
                    }
                    Err(err) => {
                        failure = Some(err);
                        0
                    }
                }
            });
            if filled == 0 {
                // ring buffer full; the rest waits in the chip FIFO
                break;
            }
            stored += filled;
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(stored),
        }
    }

    fn rx_level(&self) -> Result<usize, Error<B::Error>> {
        Ok(self.iface.read_register(self.port.channel, reg::RXLVL)? as usize)
    }

    fn fetch_byte(&self) -> Result<Option<u8>, Error<B::Error>> {
        if let Some(buffer) = &self.port.rx_buffer {
            return Ok(buffer.read_byte());
        }
        if self.rx_level()? == 0 {
            return Ok(None);
        }
        Ok(Some(self.iface.read_register(self.port.channel, reg::RHR)?))
    }
}

// ── Trait impls ────────────────────────────────────────────────────────────

impl<B: Bus, IRQ> core::fmt::Write for PortRef<'_, B, IRQ> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            let written = PortRef::write(self, bytes).map_err(|_| core::fmt::Error)?;
            bytes = &bytes[written..];
            if written == 0 {
                relax();
            }
        }
        Ok(())
    }
}

#[cfg(feature = "embedded-io")]
impl<B: Bus, IRQ> embedded_io::ErrorType for PortRef<'_, B, IRQ> {
    type Error = Error<B::Error>;
}

#[cfg(feature = "embedded-io")]
impl<B: Bus, IRQ> embedded_io::Read for PortRef<'_, B, IRQ> {
    /// Spins until at least one byte is available.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let count = PortRef::read(self, buf)?;
            if count > 0 {
                return Ok(count);
            }
            relax();
        }
    }
}

#[cfg(feature = "embedded-io")]
impl<B: Bus, IRQ> embedded_io::ReadReady for PortRef<'_, B, IRQ> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.available()? > 0)
    }
}

#[cfg(feature = "embedded-io")]
impl<B: Bus, IRQ> embedded_io::Write for PortRef<'_, B, IRQ> {
    /// Spins until at least one byte is written.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let count = PortRef::write(self, buf)?;
            if count > 0 {
                return Ok(count);
            }
            relax();
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        PortRef::flush(self)
    }
}

#[cfg(feature = "embedded-io")]
impl<B: Bus, IRQ> embedded_io::WriteReady for PortRef<'_, B, IRQ> {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.available_for_write()? > 0)
    }
}
