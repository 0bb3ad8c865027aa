//! Pull-bus scheduler
//!
//! The pull bus only moves data when the remote master clocks it, so the
//! device must always have a transaction staged. Each pass the scheduler:
//!
//! 1. Collects every completed transaction and streams its received bytes
//!    through the inbound [`FrameParser`]. One transfer may hold several
//!    frames back to back, or only part of one.
//! 2. If nothing is in flight, moves queued bytes from the transmit
//!    [`RingBuffer`] into the transaction buffer, pads to the alignment
//!    unit with [`IDLE_FILL`] and arms exactly one transaction.
//!
//! At most one transaction is ever outstanding.

use twinbus_hal::PullBus;
use twinbus_protocol::{Frame, FrameParser, ParserStats, RingBuffer};

/// Transfer sizes are a multiple of this many bytes
pub const TRANSACTION_ALIGN: usize = 4;

/// Byte clocked out when the transmit queue has nothing to send
pub const IDLE_FILL: u8 = 0xFF;

/// Default transaction buffer size
pub const DEFAULT_TRANSACTION_SIZE: usize = 256;

/// Round `len` up to the transaction alignment, minimum one unit
pub const fn aligned_len(len: usize) -> usize {
    if len == 0 {
        TRANSACTION_ALIGN
    } else {
        (len + TRANSACTION_ALIGN - 1) & !(TRANSACTION_ALIGN - 1)
    }
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerStats {
    /// Transactions queued on the bus
    pub transactions_armed: u32,
    /// Transactions collected after the master clocked them
    pub transactions_completed: u32,
    /// Bytes received from the master
    pub bytes_received: u32,
    /// Queued frame bytes handed to the bus (filler excluded)
    pub bytes_sent: u32,
}

/// Transmit and receive buffers for one transfer
#[derive(Debug, Clone)]
struct Transaction<const SIZE: usize> {
    tx: [u8; SIZE],
    rx: [u8; SIZE],
    /// `(queued bytes, transfer size)` of a `tx` the bus has not accepted yet
    staged: Option<(usize, usize)>,
}

impl<const SIZE: usize> Transaction<SIZE> {
    const fn new() -> Self {
        Self {
            tx: [IDLE_FILL; SIZE],
            rx: [0; SIZE],
            staged: None,
        }
    }

    /// Fill the transmit buffer from `queue`, returning the transfer size
    ///
    /// A buffer staged earlier and never accepted by the bus is returned
    /// as is; nothing more is popped until it has gone out.
    fn stage<const QUEUE: usize>(&mut self, queue: &RingBuffer<QUEUE>) -> (usize, usize) {
        if let Some(staged) = self.staged {
            return staged;
        }
        let mut count = 0;
        while count < SIZE {
            match queue.pop() {
                Some(byte) => {
                    self.tx[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        let len = aligned_len(count);
        self.tx[count..len].fill(IDLE_FILL);
        self.staged = Some((count, len));
        (count, len)
    }
}

/// Single-flight transaction scheduler for a pull bus
///
/// Consumer side of the transmit queue; a [`twinbus_protocol::QueueEncoder`]
/// on the same ring is the producer.
#[derive(Debug)]
pub struct PullBusScheduler<
    'q,
    B,
    const MAX_PAYLOAD: usize,
    const QUEUE: usize,
    const TXN: usize = DEFAULT_TRANSACTION_SIZE,
> {
    bus: B,
    queue: &'q RingBuffer<QUEUE>,
    parser: FrameParser<MAX_PAYLOAD>,
    transaction: Transaction<TXN>,
    in_flight: bool,
    stats: SchedulerStats,
}

impl<'q, B, const MAX_PAYLOAD: usize, const QUEUE: usize, const TXN: usize>
    PullBusScheduler<'q, B, MAX_PAYLOAD, QUEUE, TXN>
where
    B: PullBus,
{
    const TRANSACTION_ALIGNED: () = assert!(
        TXN >= TRANSACTION_ALIGN && TXN % TRANSACTION_ALIGN == 0,
        "transaction size must be a non-zero multiple of TRANSACTION_ALIGN"
    );

    /// Create a scheduler draining `queue` onto `bus`
    #[allow(clippy::let_unit_value)]
    pub fn new(bus: B, queue: &'q RingBuffer<QUEUE>) -> Self {
        let () = Self::TRANSACTION_ALIGNED;
        Self {
            bus,
            queue,
            parser: FrameParser::new(),
            transaction: Transaction::new(),
            in_flight: false,
            stats: SchedulerStats::default(),
        }
    }

    /// Run one scheduling pass
    ///
    /// `on_frame` runs for each frame completed by the received bytes.
    /// Returns the number of frames completed. Never blocks; transport
    /// errors are passed through. If the bus refuses the next transaction,
    /// its bytes stay staged and are offered again on the following pass.
    pub fn service<F>(&mut self, mut on_frame: F) -> Result<usize, B::Error>
    where
        F: FnMut(&Frame<MAX_PAYLOAD>),
    {
        let mut frames = 0;

        while self.bus.transactions_completed() > 0 {
            let received = self.bus.take_received(&mut self.transaction.rx)?.min(TXN);
            self.stats.transactions_completed = self.stats.transactions_completed.wrapping_add(1);
            self.stats.bytes_received = self.stats.bytes_received.wrapping_add(received as u32);
            trace!("pull transaction complete: {} bytes", received);

            frames += self
                .parser
                .feed_bytes(&self.transaction.rx[..received], &mut on_frame);
        }

        self.in_flight = self.bus.transactions_in_flight() > 0;
        if !self.in_flight {
            self.arm()?;
        }

        Ok(frames)
    }

    fn arm(&mut self) -> Result<(), B::Error> {
        let (count, len) = self.transaction.stage(self.queue);
        self.bus.queue(&self.transaction.tx[..len])?;
        self.transaction.staged = None;
        self.bus.trigger()?;
        self.in_flight = true;
        self.stats.transactions_armed = self.stats.transactions_armed.wrapping_add(1);
        self.stats.bytes_sent = self.stats.bytes_sent.wrapping_add(count as u32);
        trace!("pull transaction armed: {} of {} bytes queued", count, len);
        Ok(())
    }

    /// Returns true if a transaction was armed and not yet seen complete
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Scheduler counters
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Inbound parser sync-loss counters
    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// The transmit queue this scheduler drains
    pub fn queue(&self) -> &'q RingBuffer<QUEUE> {
        self.queue
    }

    /// Borrow the transport
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutably borrow the transport
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
