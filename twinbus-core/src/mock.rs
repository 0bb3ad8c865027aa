//! In-memory transports for tests

use std::collections::VecDeque;
use std::vec::Vec;

use twinbus_hal::{PullBus, PushBus};
use twinbus_protocol::WireBytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// Loopback-style UART: `rx` is what the host sent, `tx` what we wrote
#[derive(Debug, Default)]
pub struct MockPushBus {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub flushes: usize,
    pub fail_reads: bool,
}

impl MockPushBus {
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn inject_frame(&mut self, id: u8, payload: &[u8]) {
        self.rx.extend(WireBytes::new(id, payload));
    }
}

impl PushBus for MockPushBus {
    type Error = MockError;

    fn write(&mut self, data: &[u8]) -> Result<(), MockError> {
        self.tx.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), MockError> {
        self.flushes += 1;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, MockError> {
        if self.fail_reads {
            return Err(MockError);
        }
        Ok(self.rx.pop_front())
    }

    fn bytes_available(&self) -> usize {
        self.rx.len()
    }
}

/// SPI slave driven by a simulated master
///
/// `clock` completes the armed transaction: the master shifts in the
/// given bytes and receives whatever was staged.
#[derive(Debug, Default)]
pub struct MockPullBus {
    /// Staged but not yet clocked
    pub in_flight: VecDeque<Vec<u8>>,
    /// Clocked, waiting for `take_received`
    pub completed: VecDeque<Vec<u8>>,
    /// Everything the master received, per transaction
    pub master_rx: Vec<Vec<u8>>,
    pub queued: usize,
    pub triggers: usize,
    /// Set if a transaction was queued while another was in flight
    pub overlap_detected: bool,
    pub fail_queue: bool,
}

impl MockPullBus {
    /// Master clocks the in-flight transaction, sending `mosi`
    ///
    /// Returns false if nothing was armed.
    pub fn clock(&mut self, mosi: &[u8]) -> bool {
        let Some(staged) = self.in_flight.pop_front() else {
            return false;
        };
        let mut received = mosi.to_vec();
        received.truncate(staged.len());
        self.master_rx.push(staged);
        self.completed.push_back(received);
        true
    }

    /// All bytes the master has received, filler included
    pub fn master_stream(&self) -> Vec<u8> {
        self.master_rx.iter().flatten().copied().collect()
    }
}

impl PullBus for MockPullBus {
    type Error = MockError;

    fn transactions_completed(&self) -> usize {
        self.completed.len()
    }

    fn take_received(&mut self, rx: &mut [u8]) -> Result<usize, MockError> {
        let data = self.completed.pop_front().ok_or(MockError)?;
        let n = data.len().min(rx.len());
        rx[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn transactions_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn queue(&mut self, tx: &[u8]) -> Result<(), MockError> {
        if self.fail_queue {
            return Err(MockError);
        }
        if !self.in_flight.is_empty() {
            self.overlap_detected = true;
        }
        self.in_flight.push_back(tx.to_vec());
        self.queued += 1;
        Ok(())
    }

    fn trigger(&mut self) -> Result<(), MockError> {
        self.triggers += 1;
        Ok(())
    }
}
