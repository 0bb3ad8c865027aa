//! Pull bus abstraction
//!
//! On a pull bus the local side is the slave: it cannot start a transfer,
//! it can only stage a transmit buffer and wait for the remote master to
//! clock it out (e.g. an SPI slave with DMA). Every transfer is full
//! duplex, so each completed transaction also yields received bytes.

/// Slave-side, transaction based transport
///
/// None of these methods may block. The engine polls
/// [`PullBus::transactions_completed`] and
/// [`PullBus::transactions_in_flight`] once per pass and arms at most one
/// transaction at a time.
pub trait PullBus {
    /// Error type for transport operations
    type Error;

    /// Number of finished transactions whose received data has not been
    /// collected yet
    fn transactions_completed(&self) -> usize;

    /// Collect the oldest finished transaction
    ///
    /// Copies the bytes the master clocked in during that transaction into
    /// `rx` and returns how many were received. Retires the transaction,
    /// so [`PullBus::transactions_completed`] drops by one.
    fn take_received(&mut self, rx: &mut [u8]) -> Result<usize, Self::Error>;

    /// Number of transactions queued but not yet clocked by the master
    fn transactions_in_flight(&self) -> usize;

    /// Queue one transaction that shifts out `tx`
    ///
    /// `tx.len()` is the transfer size; callers keep it a multiple of the
    /// bus alignment unit.
    fn queue(&mut self, tx: &[u8]) -> Result<(), Self::Error>;

    /// Hand queued transactions to the hardware
    ///
    /// Returns immediately; completion is observed by polling.
    fn trigger(&mut self) -> Result<(), Self::Error>;
}

impl<T: PullBus + ?Sized> PullBus for &mut T {
    type Error = T::Error;

    fn transactions_completed(&self) -> usize {
        T::transactions_completed(self)
    }

    fn take_received(&mut self, rx: &mut [u8]) -> Result<usize, Self::Error> {
        T::take_received(self, rx)
    }

    fn transactions_in_flight(&self) -> usize {
        T::transactions_in_flight(self)
    }

    fn queue(&mut self, tx: &[u8]) -> Result<(), Self::Error> {
        T::queue(self, tx)
    }

    fn trigger(&mut self) -> Result<(), Self::Error> {
        T::trigger(self)
    }
}
