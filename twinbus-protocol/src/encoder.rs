//! Frame senders for both bus kinds
//!
//! - [`write_frame`] drives a [`PushBus`] directly and flushes before
//!   returning.
//! - [`QueueEncoder`] stages the frame in a [`RingBuffer`] for the pull
//!   bus, where the remote master decides when bytes leave.
//!
//! Both produce the same wire bytes ([`WireBytes`]).

use twinbus_hal::PushBus;

use crate::frame::{max_frame_size, WireBytes};
use crate::ring::RingBuffer;

/// Reasons a send request did not (fully) reach the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// Zero-length payloads are never sent
    Empty,
    /// Payload exceeds the configured cap
    TooLarge { len: usize, max: usize },
    /// Queue filled mid-frame; only `written` bytes of the frame were queued
    QueueFull { written: usize },
}

/// Failure of a push-bus operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    /// The transport reported an error
    Transport(E),
    /// The frame was rejected before touching the transport
    Send(SendError),
}

impl<E> From<SendError> for LinkError<E> {
    fn from(e: SendError) -> Self {
        LinkError::Send(e)
    }
}

/// Check a payload against the sender's size limits
pub fn validate_payload(payload: &[u8], max_payload: usize) -> Result<(), SendError> {
    if payload.is_empty() {
        return Err(SendError::Empty);
    }
    if payload.len() > max_payload {
        return Err(SendError::TooLarge {
            len: payload.len(),
            max: max_payload,
        });
    }
    Ok(())
}

/// Write one frame to a push bus and flush it
///
/// Nothing is written if the payload is empty or above `max_payload`.
pub fn write_frame<T: PushBus>(
    bus: &mut T,
    max_payload: usize,
    id: u8,
    payload: &[u8],
) -> Result<(), LinkError<T::Error>> {
    validate_payload(payload, max_payload)?;
    let bytes = WireBytes::new(id, payload);
    bus.write(bytes.header()).map_err(LinkError::Transport)?;
    bus.write(bytes.payload()).map_err(LinkError::Transport)?;
    bus.write(bytes.crc()).map_err(LinkError::Transport)?;
    bus.flush().map_err(LinkError::Transport)
}

/// Counters for frames that did not fit the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueStats {
    /// Frames fully queued
    pub frames_queued: u32,
    /// Frames cut short by a full queue
    pub truncated_frames: u32,
    /// Bytes that could not be queued
    pub dropped_bytes: u32,
    /// Requests refused for payload size
    pub rejected: u32,
}

/// Producer side of the pull-bus transmit queue
///
/// Holds the only handle that pushes into the ring; the scheduler holds
/// the only handle that pops. Drop counters live here so the ring itself
/// shares nothing but its indices.
#[derive(Debug)]
pub struct QueueEncoder<'q, const MAX_PAYLOAD: usize, const QUEUE: usize> {
    queue: &'q RingBuffer<QUEUE>,
    stats: QueueStats,
}

impl<'q, const MAX_PAYLOAD: usize, const QUEUE: usize> QueueEncoder<'q, MAX_PAYLOAD, QUEUE> {
    /// Create an encoder feeding `queue`
    pub fn new(queue: &'q RingBuffer<QUEUE>) -> Self {
        Self {
            queue,
            stats: QueueStats::default(),
        }
    }

    /// Queue one frame
    ///
    /// If the ring fills part-way, the rest of the frame is dropped. The
    /// receiver rejects the fragment by length/CRC, so size the queue for
    /// at least two maximum frames (see [`queue_capacity_for`]).
    pub fn send(&mut self, id: u8, payload: &[u8]) -> Result<(), SendError> {
        if let Err(e) = validate_payload(payload, MAX_PAYLOAD) {
            self.stats.rejected = self.stats.rejected.wrapping_add(1);
            return Err(e);
        }

        let bytes = WireBytes::new(id, payload);
        let total = bytes.len();
        let mut written = 0;
        for byte in bytes {
            if !self.queue.push(byte) {
                break;
            }
            written += 1;
        }

        if written < total {
            self.stats.truncated_frames = self.stats.truncated_frames.wrapping_add(1);
            self.stats.dropped_bytes = self
                .stats
                .dropped_bytes
                .wrapping_add((total - written) as u32);
            return Err(SendError::QueueFull { written });
        }

        self.stats.frames_queued = self.stats.frames_queued.wrapping_add(1);
        Ok(())
    }

    /// Drop and reject counters
    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    /// The ring this encoder feeds
    pub fn queue(&self) -> &'q RingBuffer<QUEUE> {
        self.queue
    }
}

/// Queue size holding two maximum frames, rounded up to a power of two
pub const fn queue_capacity_for(max_payload: usize) -> usize {
    (max_frame_size(max_payload) * 2).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameParser, FRAME_OVERHEAD};

    #[derive(Default)]
    struct RecordingBus {
        written: std::vec::Vec<u8>,
        flushes: usize,
        fail_writes: bool,
    }

    impl PushBus for RecordingBus {
        type Error = ();

        fn write(&mut self, data: &[u8]) -> Result<(), ()> {
            if self.fail_writes {
                return Err(());
            }
            self.written.extend_from_slice(data);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), ()> {
            self.flushes += 1;
            Ok(())
        }

        fn read_byte(&mut self) -> Result<Option<u8>, ()> {
            Ok(None)
        }

        fn bytes_available(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_push_writes_and_flushes() {
        let mut bus = RecordingBus::default();
        write_frame(&mut bus, 64, 7, &[1, 2, 3, 4]).unwrap();

        let expected: std::vec::Vec<u8> = WireBytes::new(7, &[1, 2, 3, 4]).collect();
        assert_eq!(bus.written, expected);
        assert_eq!(bus.flushes, 1);
    }

    #[test]
    fn test_push_rejects_without_writing() {
        let mut bus = RecordingBus::default();
        assert_eq!(
            write_frame(&mut bus, 64, 1, &[]),
            Err(LinkError::Send(SendError::Empty))
        );
        assert_eq!(
            write_frame(&mut bus, 4, 1, &[0; 5]),
            Err(LinkError::Send(SendError::TooLarge { len: 5, max: 4 }))
        );
        assert!(bus.written.is_empty());
        assert_eq!(bus.flushes, 0);
    }

    #[test]
    fn test_push_transport_error() {
        let mut bus = RecordingBus {
            fail_writes: true,
            ..Default::default()
        };
        assert_eq!(
            write_frame(&mut bus, 64, 1, &[1]),
            Err(LinkError::Transport(()))
        );
    }

    #[test]
    fn test_queue_send_roundtrip() {
        let ring = RingBuffer::<128>::new();
        let mut encoder = QueueEncoder::<64, 128>::new(&ring);
        encoder.send(0x0F, &[0xDE, 0xAD]).unwrap();
        assert_eq!(ring.len(), 2 + FRAME_OVERHEAD);

        let mut parser = FrameParser::<64>::new();
        let mut seen = 0;
        while let Some(b) = ring.pop() {
            if parser.process_byte(b) {
                seen += 1;
            }
        }
        assert_eq!(seen, 1);
        assert_eq!(&parser.frame().unwrap().payload[..], &[0xDE, 0xAD]);
        assert_eq!(encoder.stats().frames_queued, 1);
    }

    #[test]
    fn test_queue_full_mid_frame() {
        let ring = RingBuffer::<16>::new();
        let mut encoder = QueueEncoder::<64, 16>::new(&ring);

        // 10 payload bytes -> 17 wire bytes, one too many
        assert_eq!(
            encoder.send(1, &[0; 10]),
            Err(SendError::QueueFull { written: 16 })
        );
        let stats = encoder.stats();
        assert_eq!(stats.truncated_frames, 1);
        assert_eq!(stats.dropped_bytes, 1);
        assert_eq!(ring.len(), 16);
    }

    #[test]
    fn test_queue_rejects_bad_sizes() {
        let ring = RingBuffer::<64>::new();
        let mut encoder = QueueEncoder::<8, 64>::new(&ring);
        assert_eq!(encoder.send(1, &[]), Err(SendError::Empty));
        assert_eq!(
            encoder.send(1, &[0; 9]),
            Err(SendError::TooLarge { len: 9, max: 8 })
        );
        assert!(ring.is_empty());
        assert_eq!(encoder.stats().rejected, 2);
    }

    #[test]
    fn test_queue_capacity_for() {
        assert_eq!(queue_capacity_for(64), 256);
        // 2 * 17 bytes does not fit 32
        assert_eq!(queue_capacity_for(10), 64);
        assert!(queue_capacity_for(64) >= 2 * (64 + FRAME_OVERHEAD));
    }
}
