use core::fmt;

/// Driver error, generic over the bus transport's error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// The SPI or I2C transaction failed.
    Bus(E),
    /// The receive ring buffer could not be allocated.
    BufferAlloc,
    /// Zero baud rate, or a divisor that does not fit in DLL/DLH for the
    /// configured oscillator.
    InvalidBaudRate(u32),
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Error::Bus(err)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(err) => write!(f, "SC16IS7xx bus error: {err:?}"),
            Error::BufferAlloc => f.write_str("SC16IS7xx receive buffer allocation failed"),
            Error::InvalidBaudRate(baud) => write!(f, "SC16IS7xx cannot generate {baud} baud"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}

#[cfg(feature = "embedded-io")]
impl<E: fmt::Debug> embedded_io::Error for Error<E> {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::BufferAlloc => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}
