//! Frame encoding and decoding for the Twinbus wire protocol.
//!
//! Frame format (multi-byte fields little-endian):
//! - STX1 (1 byte): 0xA5
//! - STX2 (1 byte): 0x5A
//! - LENGTH (2 bytes): byte count of ID + PAYLOAD, 1..=MAX_PAYLOAD + 1
//! - ID (1 byte): packet identifier
//! - PAYLOAD (LENGTH - 1 bytes): id-specific data
//! - CRC (2 bytes): [`crc16`] over ID and PAYLOAD

use heapless::Vec;

use crate::crc::{self, crc16, CRC_INIT};

/// First frame synchronization byte
pub const FRAME_STX1: u8 = 0xA5;

/// Second frame synchronization byte
pub const FRAME_STX2: u8 = 0x5A;

/// Payload cap used when no other size is chosen
pub const DEFAULT_MAX_PAYLOAD: usize = 64;

/// Bytes in a header (STX1 + STX2 + LENGTH + ID)
pub const HEADER_SIZE: usize = 5;

/// Bytes in the trailing checksum
pub const CRC_SIZE: usize = 2;

/// Wire bytes added around a payload
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CRC_SIZE;

/// Largest encoded frame for a given payload cap
pub const fn max_frame_size(max_payload: usize) -> usize {
    max_payload + FRAME_OVERHEAD
}

/// Errors that can occur while building or encoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// A complete, checksum-valid frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame<const MAX_PAYLOAD: usize = DEFAULT_MAX_PAYLOAD> {
    /// Packet identifier
    pub id: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl<const MAX_PAYLOAD: usize> Frame<MAX_PAYLOAD> {
    /// Create a new frame with the given id and payload
    pub fn new(id: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { id, payload })
    }

    /// Create a frame with no payload
    pub fn empty(id: u8) -> Self {
        Self {
            id,
            payload: Vec::new(),
        }
    }

    /// Payload length in bytes (the wire LENGTH field minus the id byte)
    pub fn length(&self) -> u16 {
        self.payload.len() as u16
    }

    /// Wire bytes of this frame
    pub fn wire_bytes(&self) -> WireBytes<'_> {
        WireBytes::new(self.id, &self.payload)
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let bytes = self.wire_bytes();
        let frame_len = bytes.len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }
        for (slot, byte) in buffer.iter_mut().zip(bytes) {
            *slot = byte;
        }
        Ok(frame_len)
    }
}

/// Iterator over the wire encoding of one frame
///
/// Produces the header, the payload and the checksum without
/// materialising the frame in a buffer.
#[derive(Debug, Clone)]
pub struct WireBytes<'a> {
    header: [u8; HEADER_SIZE],
    payload: &'a [u8],
    crc: [u8; CRC_SIZE],
    pos: usize,
}

impl<'a> WireBytes<'a> {
    /// Lay out `id` and `payload` as a frame
    ///
    /// The payload size is not checked here; senders validate it against
    /// their cap before encoding. Payloads longer than `u16::MAX - 1` are
    /// not representable and must never reach this point.
    pub fn new(id: u8, payload: &'a [u8]) -> Self {
        let [len_lo, len_hi] = ((payload.len() + 1) as u16).to_le_bytes();
        Self {
            header: [FRAME_STX1, FRAME_STX2, len_lo, len_hi, id],
            payload,
            crc: crc16(id, payload).to_le_bytes(),
            pos: 0,
        }
    }

    /// Markers, length and id
    pub fn header(&self) -> &[u8; HEADER_SIZE] {
        &self.header
    }

    /// Payload bytes
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Checksum bytes, low byte first
    pub fn crc(&self) -> &[u8; CRC_SIZE] {
        &self.crc
    }
}

impl Iterator for WireBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let pos = self.pos;
        let payload_end = HEADER_SIZE + self.payload.len();
        let byte = if pos < HEADER_SIZE {
            self.header[pos]
        } else if pos < payload_end {
            self.payload[pos - HEADER_SIZE]
        } else if pos < payload_end + CRC_SIZE {
            self.crc[pos - payload_end]
        } else {
            return None;
        };
        self.pos += 1;
        Some(byte)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let total = FRAME_OVERHEAD + self.payload.len();
        let remaining = total.saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WireBytes<'_> {}

/// Position of the parser in the frame grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParserState {
    /// Hunting for STX1
    SeekStart1,
    /// Got STX1, expecting STX2
    SeekStart2,
    /// Expecting length low byte
    LengthLow,
    /// Expecting length high byte
    LengthHigh,
    /// Expecting the id byte
    Id,
    /// Reading payload bytes
    Payload,
    /// Expecting checksum low byte
    CrcLow,
    /// Expecting checksum high byte
    CrcHigh,
}

/// Sync-loss counters kept by a [`FrameParser`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParserStats {
    /// Frames that passed the checksum
    pub frames: u32,
    /// STX1 seen but not followed by STX2
    pub marker_misses: u32,
    /// Declared length was zero or above the payload cap
    pub length_rejects: u32,
    /// Complete frames dropped on checksum mismatch
    pub crc_failures: u32,
}

/// Byte-at-a-time frame parser
///
/// Every byte advances the state machine deterministically. Any bad
/// marker, length or checksum drops the partial frame and returns to
/// [`ParserState::SeekStart1`], so the parser can never wedge. There is
/// no timeout: a frame cut short on the wire is only abandoned once its
/// missing bytes have been supplied by whatever follows.
#[derive(Debug, Clone)]
pub struct FrameParser<const MAX_PAYLOAD: usize = DEFAULT_MAX_PAYLOAD> {
    state: ParserState,
    buffer: Vec<u8, MAX_PAYLOAD>,
    expected_length: u16,
    id: u8,
    crc: u16,
    crc_read: u16,
    frame: Frame<MAX_PAYLOAD>,
    has_frame: bool,
    stats: ParserStats,
}

impl<const MAX_PAYLOAD: usize> Default for FrameParser<MAX_PAYLOAD> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_PAYLOAD: usize> FrameParser<MAX_PAYLOAD> {
    const LENGTH_FITS: () = assert!(
        MAX_PAYLOAD >= 1 && MAX_PAYLOAD < u16::MAX as usize,
        "MAX_PAYLOAD + 1 must fit the 16-bit length field"
    );

    /// Create a new frame parser
    #[allow(clippy::let_unit_value)]
    pub fn new() -> Self {
        let () = Self::LENGTH_FITS;
        Self {
            state: ParserState::SeekStart1,
            buffer: Vec::new(),
            expected_length: 0,
            id: 0,
            crc: CRC_INIT,
            crc_read: 0,
            frame: Frame::empty(0),
            has_frame: false,
            stats: ParserStats::default(),
        }
    }

    /// Drop any partial frame and hunt for STX1 again
    ///
    /// The last completed frame stays available.
    pub fn reset(&mut self) {
        self.state = ParserState::SeekStart1;
        self.expected_length = 0;
        self.crc = CRC_INIT;
        self.crc_read = 0;
    }

    /// Current position in the frame grammar
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Sync-loss counters
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Last completed frame, if any frame has completed yet
    pub fn frame(&self) -> Option<&Frame<MAX_PAYLOAD>> {
        self.has_frame.then_some(&self.frame)
    }

    /// Feed a single byte to the parser
    ///
    /// Returns true exactly when this byte completed a checksum-valid
    /// frame; the frame is then available from [`FrameParser::frame`]
    /// until the next completion.
    pub fn process_byte(&mut self, byte: u8) -> bool {
        match self.state {
            ParserState::SeekStart1 => {
                if byte == FRAME_STX1 {
                    self.state = ParserState::SeekStart2;
                }
            }
            ParserState::SeekStart2 => {
                if byte == FRAME_STX2 {
                    self.state = ParserState::LengthLow;
                } else {
                    self.stats.marker_misses = self.stats.marker_misses.wrapping_add(1);
                    self.reset();
                }
            }
            ParserState::LengthLow => {
                self.expected_length = byte as u16;
                self.state = ParserState::LengthHigh;
            }
            ParserState::LengthHigh => {
                self.expected_length |= (byte as u16) << 8;
                let length = self.expected_length as usize;
                if length == 0 || length > MAX_PAYLOAD + 1 {
                    self.stats.length_rejects = self.stats.length_rejects.wrapping_add(1);
                    self.reset();
                } else {
                    self.state = ParserState::Id;
                }
            }
            ParserState::Id => {
                self.id = byte;
                self.crc = crc::update(CRC_INIT, byte);
                self.buffer.clear();
                self.state = if self.expected_length == 1 {
                    ParserState::CrcLow
                } else {
                    ParserState::Payload
                };
            }
            ParserState::Payload => {
                // Capacity is guaranteed by the length check
                if self.buffer.push(byte).is_err() {
                    self.reset();
                    return false;
                }
                self.crc = crc::update(self.crc, byte);
                if self.buffer.len() == self.expected_length as usize - 1 {
                    self.state = ParserState::CrcLow;
                }
            }
            ParserState::CrcLow => {
                self.crc_read = byte as u16;
                self.state = ParserState::CrcHigh;
            }
            ParserState::CrcHigh => {
                self.crc_read |= (byte as u16) << 8;
                let valid = self.crc_read == self.crc;
                if valid {
                    self.frame.id = self.id;
                    core::mem::swap(&mut self.frame.payload, &mut self.buffer);
                    self.has_frame = true;
                    self.stats.frames = self.stats.frames.wrapping_add(1);
                } else {
                    self.stats.crc_failures = self.stats.crc_failures.wrapping_add(1);
                }
                self.reset();
                return valid;
            }
        }
        false
    }

    /// Feed a single byte, returning the frame it completed
    pub fn feed(&mut self, byte: u8) -> Option<&Frame<MAX_PAYLOAD>> {
        if self.process_byte(byte) {
            Some(&self.frame)
        } else {
            None
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Every byte is consumed; `on_frame` runs once per completed frame.
    /// Returns the number of frames completed.
    pub fn feed_bytes<F>(&mut self, bytes: &[u8], mut on_frame: F) -> usize
    where
        F: FnMut(&Frame<MAX_PAYLOAD>),
    {
        let mut frames = 0;
        for &byte in bytes {
            if self.process_byte(byte) {
                frames += 1;
                on_frame(&self.frame);
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    type Parser = FrameParser<DEFAULT_MAX_PAYLOAD>;

    fn encode(id: u8, payload: &[u8]) -> std::vec::Vec<u8> {
        WireBytes::new(id, payload).collect()
    }

    fn parse_all(parser: &mut Parser, bytes: &[u8]) -> std::vec::Vec<Frame> {
        let mut frames = std::vec::Vec::new();
        parser.feed_bytes(bytes, |f| frames.push(f.clone()));
        frames
    }

    #[test]
    fn test_wire_layout() {
        let bytes = encode(7, &[0x01, 0x02, 0x03, 0x04]);
        let crc = crc16(7, &[0x01, 0x02, 0x03, 0x04]).to_le_bytes();

        assert_eq!(
            bytes,
            [0xA5, 0x5A, 0x05, 0x00, 0x07, 0x01, 0x02, 0x03, 0x04, crc[0], crc[1]]
        );
    }

    #[test]
    fn test_parse_concrete_frame() {
        let bytes = encode(7, &[1, 2, 3, 4]);
        assert_eq!(bytes.len(), 11);

        let mut parser = Parser::new();
        let completions: std::vec::Vec<bool> =
            bytes.iter().map(|&b| parser.process_byte(b)).collect();

        // Only the final CRC byte completes the frame
        assert!(completions[..10].iter().all(|&c| !c));
        assert!(completions[10]);

        let frame = parser.frame().unwrap();
        assert_eq!(frame.id, 7);
        assert_eq!(frame.length(), 4);
        assert_eq!(&frame.payload[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_edge_triggered() {
        let bytes = encode(3, &[9]);
        let mut parser = Parser::new();
        let frames = parse_all(&mut parser, &bytes);
        assert_eq!(frames.len(), 1);

        // Idle filler afterwards never re-reports the frame
        for _ in 0..16 {
            assert!(!parser.process_byte(0xFF));
        }
        assert_eq!(parser.frame().map(|f| f.id), Some(3));
    }

    #[test]
    fn test_no_frame_before_first_completion() {
        let parser = Parser::new();
        assert!(parser.frame().is_none());
        assert_eq!(parser.state(), ParserState::SeekStart1);
    }

    #[test]
    fn test_payloadless_frame() {
        let crc = crc16(0x14, &[]).to_le_bytes();
        let bytes = [0xA5, 0x5A, 0x01, 0x00, 0x14, crc[0], crc[1]];

        let mut parser = Parser::new();
        let frames = parse_all(&mut parser, &bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, 0x14);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn test_zero_length_rejected() {
        let mut parser = Parser::new();
        for b in [0xA5, 0x5A, 0x00, 0x00] {
            assert!(!parser.process_byte(b));
        }
        assert_eq!(parser.state(), ParserState::SeekStart1);
        assert_eq!(parser.stats().length_rejects, 1);
    }

    #[test]
    fn test_max_payload_accepted() {
        let payload = [0x5Au8; DEFAULT_MAX_PAYLOAD];
        let mut parser = Parser::new();
        let frames = parse_all(&mut parser, &encode(1, &payload));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.len(), DEFAULT_MAX_PAYLOAD);
    }

    #[test]
    fn test_oversize_length_rejected_before_payload() {
        let [lo, hi] = ((DEFAULT_MAX_PAYLOAD + 2) as u16).to_le_bytes();
        let mut parser = Parser::new();
        for b in [0xA5, 0x5A, lo, hi] {
            parser.process_byte(b);
        }
        // Rejected at the length check, before the id byte
        assert_eq!(parser.state(), ParserState::SeekStart1);
        assert_eq!(parser.stats().length_rejects, 1);
    }

    #[test]
    fn test_bad_second_marker() {
        let mut parser = Parser::new();
        parser.process_byte(0xA5);
        assert_eq!(parser.state(), ParserState::SeekStart2);
        parser.process_byte(0x00);
        assert_eq!(parser.state(), ParserState::SeekStart1);
        assert_eq!(parser.stats().marker_misses, 1);
    }

    #[test]
    fn test_repeated_first_marker_is_not_special_cased() {
        // A5 A5 5A: the second A5 fails the STX2 check, then 5A is not STX1
        let mut bytes = std::vec![0xA5];
        bytes.extend(encode(2, &[1, 2]));

        let mut parser = Parser::new();
        assert!(parse_all(&mut parser, &bytes).is_empty());

        // The next genuine frame resynchronises
        let frames = parse_all(&mut parser, &encode(2, &[1, 2]));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_crc_mismatch_then_recover() {
        let mut bad = encode(5, &[10, 20, 30]);
        let last = bad.len() - 1;
        bad[last] ^= 0x01;

        let mut parser = Parser::new();
        assert!(parse_all(&mut parser, &bad).is_empty());
        assert_eq!(parser.stats().crc_failures, 1);
        assert_eq!(parser.state(), ParserState::SeekStart1);

        let frames = parse_all(&mut parser, &encode(5, &[10, 20, 30]));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut bytes = encode(1, &[1]);
        bytes.extend(encode(2, &[2, 2]));
        bytes.extend(encode(3, &[3, 3, 3]));

        let mut parser = Parser::new();
        let frames = parse_all(&mut parser, &bytes);
        let ids: std::vec::Vec<u8> = frames.iter().map(|f| f.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(parser.stats().frames, 3);
    }

    #[test]
    fn test_truncated_frame_stalls_until_filled() {
        let full = encode(9, &[1, 2, 3, 4, 5, 6]);
        let truncated = &full[..7];

        let mut parser = Parser::new();
        assert!(parse_all(&mut parser, truncated).is_empty());
        assert_eq!(parser.state(), ParserState::Payload);
    }

    #[test]
    fn test_frame_encode_into_buffer() {
        let frame = Frame::<DEFAULT_MAX_PAYLOAD>::new(0x21, &[1, 2, 3]).unwrap();
        let mut buffer = [0u8; 16];
        let len = frame.encode(&mut buffer).unwrap();
        assert_eq!(len, 3 + FRAME_OVERHEAD);
        assert_eq!(&buffer[..len], &encode(0x21, &[1, 2, 3])[..]);

        let mut small = [0u8; 4];
        assert_eq!(frame.encode(&mut small), Err(FrameError::BufferTooSmall));
    }

    #[test]
    fn test_payload_too_large() {
        let large = [0u8; DEFAULT_MAX_PAYLOAD + 1];
        assert_eq!(
            Frame::<DEFAULT_MAX_PAYLOAD>::new(0x21, &large),
            Err(FrameError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_wire_bytes_exact_size() {
        let mut bytes = WireBytes::new(1, &[0; 10]);
        assert_eq!(bytes.len(), 17);
        bytes.next();
        assert_eq!(bytes.len(), 16);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            id in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 1..=DEFAULT_MAX_PAYLOAD),
        ) {
            let mut parser = Parser::new();
            let frames = parse_all(&mut parser, &encode(id, &payload));
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].id, id);
            prop_assert_eq!(&frames[0].payload[..], &payload[..]);
        }

        #[test]
        fn prop_resync_after_noise(
            noise in proptest::collection::vec(any::<u8>().prop_filter("no STX1", |b| *b != FRAME_STX1), 0..64),
            id in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 1..=16),
        ) {
            let mut bytes = noise.clone();
            bytes.extend(encode(id, &payload));

            let mut parser = Parser::new();
            let frames = parse_all(&mut parser, &bytes);
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(&frames[0].payload[..], &payload[..]);
        }

        #[test]
        fn prop_bit_flip_rejected(
            id in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 1..=16),
            flip in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let good = encode(id, &payload);
            let mut bad = good.clone();
            // Flip within payload or CRC
            let span = payload.len() + CRC_SIZE;
            let pos = HEADER_SIZE + flip.index(span);
            bad[pos] ^= 1 << bit;

            let mut parser = Parser::new();
            prop_assert!(parse_all(&mut parser, &bad).is_empty());
            prop_assert_eq!(parser.state(), ParserState::SeekStart1);

            let frames = parse_all(&mut parser, &good);
            prop_assert_eq!(frames.len(), 1);
        }

        #[test]
        fn prop_length_bound(len in (DEFAULT_MAX_PAYLOAD as u16 + 2)..=u16::MAX) {
            let [lo, hi] = len.to_le_bytes();
            let mut parser = Parser::new();
            for b in [FRAME_STX1, FRAME_STX2, lo, hi] {
                prop_assert!(!parser.process_byte(b));
            }
            prop_assert_eq!(parser.state(), ParserState::SeekStart1);
            prop_assert_eq!(parser.stats().length_rejects, 1);
        }
    }
}
