//! Push bus abstraction
//!
//! A push bus is a byte stream where the local side can transmit whenever
//! it likes, e.g. a UART. Reads are polled; nothing here ever waits for
//! data to arrive.

/// Push-capable byte stream
///
/// Implemented by the board for its UART (or any other stream it can
/// drive on demand).
pub trait PushBus {
    /// Error type for transport operations
    type Error;

    /// Write data to the transport
    ///
    /// May buffer internally; call [`PushBus::flush`] to force the bytes out.
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered data onto the wire
    ///
    /// This may block until the hardware FIFO has drained.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Read a single byte if one is available
    ///
    /// Returns `Ok(None)` when the receive buffer is empty.
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Number of received bytes waiting to be read
    fn bytes_available(&self) -> usize;
}

impl<T: PushBus + ?Sized> PushBus for &mut T {
    type Error = T::Error;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        T::write(self, data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        T::flush(self)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        T::read_byte(self)
    }

    fn bytes_available(&self) -> usize {
        T::bytes_available(self)
    }
}
