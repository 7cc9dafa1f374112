//! SC16IS7xx chip driver: the bus interface plus one or two UART ports.

use core::cell::RefCell;
use core::convert::Infallible;

use critical_section::Mutex;
use embedded_hal::digital::{ErrorType, InputPin};
use log::{debug, info, trace, warn};

use crate::bus::Bus;
use crate::error::Error;
use crate::port::{Port, PortMut, PortRef};
use crate::registers::{self as reg, Channel};
use crate::worker::{Job, Scheduler};

/// Placeholder IRQ pin for chips run without one. Never asserted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIrq;

impl ErrorType for NoIrq {
    type Error = Infallible;
}

impl InputPin for NoIrq {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }
}

// ── Interface ──────────────────────────────────────────────────────────────

/// Bus, IRQ pin and scheduler shared by the ports of one chip.
///
/// Every bus access takes a critical section for exactly one transaction, so
/// the application and the worker never interleave inside one.
pub(crate) struct Interface<B, IRQ> {
    bus: Mutex<RefCell<B>>,
    irq: Option<Mutex<RefCell<IRQ>>>,
    oscillator_hz: u32,
    scheduler: Scheduler,
}

impl<B, IRQ> Interface<B, IRQ> {
    pub(crate) fn oscillator_hz(&self) -> u32 {
        self.oscillator_hz
    }

    pub(crate) fn has_irq(&self) -> bool {
        self.irq.is_some()
    }

    pub(crate) fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }
}

impl<B: Bus, IRQ> Interface<B, IRQ> {
    fn transaction<R>(
        &self,
        op: impl FnOnce(&mut B) -> Result<R, B::Error>,
    ) -> Result<R, Error<B::Error>> {
        critical_section::with(|cs| op(&mut self.bus.borrow_ref_mut(cs))).map_err(Error::Bus)
    }

    pub(crate) fn read_register(&self, channel: Channel, register: u8) -> Result<u8, Error<B::Error>> {
        self.transaction(|bus| bus.read_register(channel, register))
    }

    pub(crate) fn write_register(
        &self,
        channel: Channel,
        register: u8,
        value: u8,
    ) -> Result<(), Error<B::Error>> {
        trace!("{:?}: reg {:#04x} <- {:#04x}", channel, register, value);
        self.transaction(|bus| bus.write_register(channel, register, value))
    }

    pub(crate) fn read_fifo(&self, channel: Channel, buf: &mut [u8]) -> Result<(), Error<B::Error>> {
        self.transaction(|bus| bus.read_fifo(channel, buf))
    }

    pub(crate) fn write_fifo(&self, channel: Channel, data: &[u8]) -> Result<(), Error<B::Error>> {
        self.transaction(|bus| bus.write_fifo(channel, data))
    }
}

impl<B, IRQ: InputPin> Interface<B, IRQ> {
    /// IRQ is open drain and active low. A pin read failure counts as idle.
    fn irq_asserted(&self) -> bool {
        let Some(pin) = &self.irq else {
            return false;
        };
        critical_section::with(|cs| pin.borrow_ref_mut(cs).is_low()).unwrap_or_else(|err| {
            warn!("IRQ pin read failed: {:?}", err);
            false
        })
    }
}

// ── Chip ───────────────────────────────────────────────────────────────────

struct PortCount<const PORTS: usize>;

impl<const PORTS: usize> PortCount<PORTS> {
    const VALID: () = assert!(PORTS == 1 || PORTS == 2, "SC16IS7xx has one or two UARTs");
}

/// SC16IS7xx UART bridge with `PORTS` channels.
///
/// Use the [`Sc16is7x0`] or [`Sc16is7x2`] aliases rather than naming the
/// port count. Configure through [`a_mut()`](Self::a_mut) /
/// [`b_mut()`](Sc16is7x2::b_mut), then do I/O through the shared handles
/// from [`a()`](Self::a) / [`b()`](Sc16is7x2::b).
///
/// ```ignore
/// let mut uart = Sc16is7x2::new(SpiBus::new(spi));
/// uart.a_mut().begin(115_200, Options::MODE_8N1)?;
/// uart.b_mut().with_buffered_read(256)?;
/// uart.b_mut().begin(9_600, Options::MODE_8N1 | Options::FLOW_CONTROL_RTS_CTS)?;
/// writeln!(uart.a(), "hello")?;
/// ```
pub struct Sc16is7xx<B, IRQ, const PORTS: usize> {
    iface: Interface<B, IRQ>,
    ports: [Port; PORTS],
}

/// Single-UART parts: SC16IS740, SC16IS750, SC16IS760.
pub type Sc16is7x0<B, IRQ = NoIrq> = Sc16is7xx<B, IRQ, 1>;

/// Dual-UART parts: SC16IS752, SC16IS762.
pub type Sc16is7x2<B, IRQ = NoIrq> = Sc16is7xx<B, IRQ, 2>;

impl<B: Bus, const PORTS: usize> Sc16is7xx<B, NoIrq, PORTS> {
    /// Create a driver on `bus` with the default 1.8432 MHz oscillator and
    /// no IRQ pin.
    pub fn new(bus: B) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = PortCount::<PORTS>::VALID;
        Sc16is7xx {
            iface: Interface {
                bus: Mutex::new(RefCell::new(bus)),
                irq: None,
                oscillator_hz: reg::DEFAULT_OSCILLATOR_HZ,
                scheduler: Scheduler::new(),
            },
            ports: core::array::from_fn(|index| Port::new(Channel::from_index(index))),
        }
    }

    /// Watch the chip's IRQ output on `pin`. Ports configured after this
    /// are interrupt driven: buffered ports drain only after an RX
    /// interrupt, and [`on_interrupt`](PortMut::on_interrupt) handlers run.
    pub fn with_irq<P: InputPin>(self, pin: P) -> Sc16is7xx<B, P, PORTS> {
        debug!("IRQ pin attached");
        let Interface {
            bus,
            oscillator_hz,
            scheduler,
            ..
        } = self.iface;
        Sc16is7xx {
            iface: Interface {
                bus,
                irq: Some(Mutex::new(RefCell::new(pin))),
                oscillator_hz,
                scheduler,
            },
            ports: self.ports,
        }
    }
}

impl<B: Bus, IRQ, const PORTS: usize> Sc16is7xx<B, IRQ, PORTS> {
    /// Crystal or clock frequency on XTAL1. Takes effect at the next
    /// [`begin()`](PortMut::begin).
    pub fn with_oscillator_frequency(mut self, hz: u32) -> Self {
        self.iface.oscillator_hz = hz;
        self
    }

    pub fn oscillator_frequency(&self) -> u32 {
        self.iface.oscillator_hz
    }

    /// Jobs the worker runs each tick.
    pub fn scheduler(&self) -> &Scheduler {
        &self.iface.scheduler
    }

    /// I/O handle for `channel`, or `None` if the part lacks it.
    pub fn port(&self, channel: Channel) -> Option<PortRef<'_, B, IRQ>> {
        let port = self.ports.get(channel.index())?;
        Some(PortRef {
            iface: &self.iface,
            port,
        })
    }

    /// Configuration handle for `channel`, or `None` if the part lacks it.
    pub fn port_mut(&mut self, channel: Channel) -> Option<PortMut<'_, B, IRQ>> {
        let port = self.ports.get_mut(channel.index())?;
        Some(PortMut {
            iface: &mut self.iface,
            port,
        })
    }

    /// Channel A, present on every part.
    pub fn a(&self) -> PortRef<'_, B, IRQ> {
        PortRef {
            iface: &self.iface,
            port: &self.ports[0],
        }
    }

    pub fn a_mut(&mut self) -> PortMut<'_, B, IRQ> {
        PortMut {
            iface: &mut self.iface,
            port: &mut self.ports[0],
        }
    }

    /// I/O handles for every port, A first.
    pub fn ports(&self) -> impl Iterator<Item = PortRef<'_, B, IRQ>> {
        let iface = &self.iface;
        self.ports.iter().map(move |port| PortRef { iface, port })
    }

    /// Run `f` with a configuration handle for each port in turn.
    pub fn for_each_port<F>(&mut self, mut f: F)
    where
        F: FnMut(PortMut<'_, B, IRQ>),
    {
        for port in self.ports.iter_mut() {
            f(PortMut {
                iface: &mut self.iface,
                port,
            });
        }
    }

    /// Set IOCONTROL's software reset bit. Every register returns to its
    /// power-on value, so ports must be configured again.
    ///
    /// The chip resets before acknowledging the write, so on I2C the bus
    /// error that follows is expected and ignored.
    pub fn software_reset(&mut self) {
        if let Err(err) =
            self.iface
                .write_register(Channel::A, reg::IOCONTROL, reg::IOCONTROL_SOFTWARE_RESET)
        {
            debug!("software reset not acknowledged: {}", err);
        }
        for port in self.ports.iter_mut() {
            port.reset_state();
        }
    }

    /// Compare IER, IIR and LCR on every port with their power-on values.
    ///
    /// Advisory only: mismatches and bus errors are logged and reported as
    /// `false`.
    pub fn power_on_check(&self) -> bool {
        let expected = [
            ("IER", reg::IER, reg::POR_IER),
            ("IIR", reg::IIR, reg::POR_IIR),
            ("LCR", reg::LCR, reg::POR_LCR),
        ];
        let mut pass = true;
        for port in self.ports() {
            for (name, register, value) in expected {
                match self.iface.read_register(port.channel(), register) {
                    Ok(actual) if actual == value => {}
                    Ok(actual) => {
                        warn!(
                            "{:?}: {} is {:#04x}, expected {:#04x} after reset",
                            port.channel(),
                            name,
                            actual,
                            value
                        );
                        pass = false;
                    }
                    Err(err) => {
                        warn!("{:?}: reading {} failed: {}", port.channel(), name, err);
                        pass = false;
                    }
                }
            }
        }
        if pass {
            info!("power-on check passed");
        }
        pass
    }

    /// Consume the driver and hand back the bus and IRQ pin.
    pub fn release(self) -> (B, Option<IRQ>) {
        let bus = self.iface.bus.into_inner().into_inner();
        let irq = self.iface.irq.map(|pin| pin.into_inner().into_inner());
        (bus, irq)
    }
}

impl<B: Bus, IRQ: InputPin, const PORTS: usize> Sc16is7xx<B, IRQ, PORTS> {
    /// Run every registered job once, in registration order.
    ///
    /// Call this about every millisecond from a periodic task, or let
    /// `spawn_worker` do it. Bus errors are logged and the tick carries on.
    pub fn tick(&self) {
        for job in self.iface.scheduler.jobs() {
            match *job {
                Job::PollIrq => self.poll_irq(),
                Job::DrainReceive(channel) => {
                    let Some(port) = self.port(channel) else {
                        continue;
                    };
                    if let Err(err) = port.drain_receive() {
                        warn!("{:?}: receive drain failed: {}", channel, err);
                    }
                }
            }
        }
    }

    fn poll_irq(&self) {
        if !self.iface.irq_asserted() {
            return;
        }
        for port in self.ports() {
            if let Err(err) = port.handle_iir() {
                warn!("{:?}: IIR read failed: {}", port.channel(), err);
            }
        }
    }
}

impl<B: Bus, IRQ> Sc16is7x2<B, IRQ> {
    /// Channel B.
    pub fn b(&self) -> PortRef<'_, B, IRQ> {
        PortRef {
            iface: &self.iface,
            port: &self.ports[1],
        }
    }

    pub fn b_mut(&mut self) -> PortMut<'_, B, IRQ> {
        PortMut {
            iface: &mut self.iface,
            port: &mut self.ports[1],
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl<B, IRQ, const PORTS: usize> Sc16is7xx<B, IRQ, PORTS>
where
    B: Bus + Send + 'static,
    IRQ: InputPin + Send + 'static,
{
    /// Start the background thread that calls [`tick()`](Self::tick) every
    /// millisecond.
    ///
    /// Only the first call after a job is registered starts a thread; later
    /// calls return `None`. The thread holds a weak reference and exits once
    /// the chip is dropped.
    pub fn spawn_worker(self: &std::sync::Arc<Self>) -> Option<std::thread::JoinHandle<()>> {
        if !self.iface.scheduler.claim_start() {
            return None;
        }
        debug!("starting worker thread");
        let chip = std::sync::Arc::downgrade(self);
        let period = std::time::Duration::from_millis(crate::worker::TICK_PERIOD_MS as u64);
        Some(std::thread::spawn(move || {
            while let Some(chip) = chip.upgrade() {
                chip.tick();
                drop(chip);
                std::thread::sleep(period);
            }
        }))
    }
}
