//! Interrupt source decoding and per-port handler registration.
//!
//! The chip has no way to push an interrupt to the host other than its IRQ
//! line, and servicing it takes bus transactions, so the driver polls: the
//! worker reads the IRQ pin each tick and, when asserted, reads IIR on every
//! port and dispatches the decoded cause here.

use alloc::boxed::Box;

use crate::registers::{self as reg, Channel};

/// Interrupt source reported by IIR bits 5:0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptCause {
    /// Overrun, parity, framing or break error (highest priority).
    LineStatus,
    /// Data sat in the RX FIFO below the trigger level for 4 character times.
    RxTimeout,
    /// RX FIFO reached its trigger level.
    RxData,
    /// TX FIFO dropped below its trigger level.
    TxSpace,
    /// CTS, DSR, RI or CD changed.
    ModemStatus,
    /// A GPIO input configured for interrupts changed state.
    InputPin,
    /// An Xoff character (or special character) was received.
    XoffReceived,
    /// CTS or RTS changed from active to inactive.
    CtsRts,
}

impl InterruptCause {
    /// Number of distinct causes; the size of a handler table.
    pub const COUNT: usize = 8;

    /// Decode an IIR value.
    ///
    /// Returns `Ok(None)` when IIR says nothing is pending, and `Err(code)`
    /// for a source code the chip should never report.
    pub fn from_iir(iir: u8) -> Result<Option<Self>, u8> {
        if iir & reg::IIR_NONE_PENDING != 0 {
            return Ok(None);
        }
        let cause = match iir & reg::IIR_SOURCE_MASK {
            0x06 => InterruptCause::LineStatus,
            0x0C => InterruptCause::RxTimeout,
            0x04 => InterruptCause::RxData,
            0x02 => InterruptCause::TxSpace,
            0x00 => InterruptCause::ModemStatus,
            0x30 => InterruptCause::InputPin,
            0x10 => InterruptCause::XoffReceived,
            0x20 => InterruptCause::CtsRts,
            code => return Err(code),
        };
        Ok(Some(cause))
    }

    /// Whether this cause means bytes are waiting in the RX FIFO.
    pub fn is_receive(self) -> bool {
        matches!(self, InterruptCause::RxTimeout | InterruptCause::RxData)
    }

    /// IER bits that make the chip raise this cause. Input-pin changes are
    /// enabled through IOINTENA instead, so they have none.
    pub fn ier_bits(self) -> u8 {
        match self {
            InterruptCause::RxTimeout | InterruptCause::RxData => reg::IER_RHR,
            InterruptCause::TxSpace => reg::IER_THR,
            InterruptCause::LineStatus => reg::IER_LINE_STATUS,
            InterruptCause::ModemStatus => reg::IER_MODEM_STATUS,
            InterruptCause::XoffReceived => reg::IER_XOFF,
            InterruptCause::CtsRts => reg::IER_RTS | reg::IER_CTS,
            InterruptCause::InputPin => 0,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

const ALL_CAUSES: [InterruptCause; InterruptCause::COUNT] = [
    InterruptCause::LineStatus,
    InterruptCause::RxTimeout,
    InterruptCause::RxData,
    InterruptCause::TxSpace,
    InterruptCause::ModemStatus,
    InterruptCause::InputPin,
    InterruptCause::XoffReceived,
    InterruptCause::CtsRts,
];

/// Callback run from the worker when its cause fires on a port.
pub type InterruptHandler = Box<dyn Fn(Channel, InterruptCause) + Send + Sync>;

/// One optional handler per [`InterruptCause`].
#[derive(Default)]
pub(crate) struct HandlerTable {
    slots: [Option<InterruptHandler>; InterruptCause::COUNT],
}

impl HandlerTable {
    /// Install `handler` for `cause`, replacing any previous one.
    pub fn set(&mut self, cause: InterruptCause, handler: InterruptHandler) {
        self.slots[cause.slot()] = Some(handler);
    }

    pub fn clear(&mut self, cause: InterruptCause) {
        self.slots[cause.slot()] = None;
    }

    pub fn is_set(&self, cause: InterruptCause) -> bool {
        self.slots[cause.slot()].is_some()
    }

    /// IER bits for every cause that has a handler.
    pub fn ier_bits(&self) -> u8 {
        ALL_CAUSES
            .iter()
            .filter(|cause| self.is_set(**cause))
            .fold(0, |bits, cause| bits | cause.ier_bits())
    }

    /// Run the handler for `cause`. Returns whether one was registered.
    pub fn dispatch(&self, channel: Channel, cause: InterruptCause) -> bool {
        match &self.slots[cause.slot()] {
            Some(handler) => {
                handler(channel, cause);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn decodes_every_documented_source() {
        let table = [
            (0x06, InterruptCause::LineStatus),
            (0x0C, InterruptCause::RxTimeout),
            (0x04, InterruptCause::RxData),
            (0x02, InterruptCause::TxSpace),
            (0x00, InterruptCause::ModemStatus),
            (0x30, InterruptCause::InputPin),
            (0x10, InterruptCause::XoffReceived),
            (0x20, InterruptCause::CtsRts),
        ];
        for (iir, cause) in table {
            assert_eq!(InterruptCause::from_iir(iir), Ok(Some(cause)));
            // FIFO-enabled bits 7:6 are ignored
            assert_eq!(InterruptCause::from_iir(iir | 0xC0), Ok(Some(cause)));
        }
    }

    #[test]
    fn nothing_pending_and_unknown_codes() {
        assert_eq!(InterruptCause::from_iir(0x01), Ok(None));
        assert_eq!(InterruptCause::from_iir(0xC1), Ok(None));
        assert_eq!(InterruptCause::from_iir(0x08), Err(0x08));
        assert_eq!(InterruptCause::from_iir(0x3E), Err(0x3E));
    }

    #[test]
    fn receive_causes() {
        assert!(InterruptCause::RxTimeout.is_receive());
        assert!(InterruptCause::RxData.is_receive());
        assert!(!InterruptCause::TxSpace.is_receive());
    }

    #[test]
    fn dispatch_runs_only_matching_slot() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut handlers = HandlerTable::default();
        let counter = Arc::clone(&hits);
        handlers.set(
            InterruptCause::LineStatus,
            Box::new(move |channel, cause| {
                assert_eq!(channel, Channel::B);
                assert_eq!(cause, InterruptCause::LineStatus);
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );

        assert!(handlers.is_set(InterruptCause::LineStatus));
        assert!(handlers.dispatch(Channel::B, InterruptCause::LineStatus));
        assert!(!handlers.dispatch(Channel::B, InterruptCause::ModemStatus));
        assert_eq!(hits.load(Ordering::Relaxed), 1);

        assert_eq!(handlers.ier_bits(), reg::IER_LINE_STATUS);

        handlers.clear(InterruptCause::LineStatus);
        assert_eq!(handlers.ier_bits(), 0);
        assert!(!handlers.dispatch(Channel::B, InterruptCause::LineStatus));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
