//! Push-bus link
//!
//! Binds one push transport to its own frame parser. Sending writes and
//! flushes immediately; receiving drains whatever bytes the transport has
//! buffered without ever waiting for more.

use twinbus_hal::PushBus;
use twinbus_protocol::{write_frame, Frame, FrameParser, LinkError, ParserStats};

/// Push-link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PushStats {
    /// Frames written and flushed
    pub frames_sent: u32,
    /// Send requests refused for payload size
    pub rejected: u32,
    /// Bytes fed to the parser, by either receive path
    pub bytes_received: u32,
}

/// Framed link over a push bus
#[derive(Debug)]
pub struct PushLink<T, const MAX_PAYLOAD: usize> {
    bus: T,
    parser: FrameParser<MAX_PAYLOAD>,
    stats: PushStats,
}

impl<T: PushBus, const MAX_PAYLOAD: usize> PushLink<T, MAX_PAYLOAD> {
    /// Create a link owning `bus`
    pub fn new(bus: T) -> Self {
        Self {
            bus,
            parser: FrameParser::new(),
            stats: PushStats::default(),
        }
    }

    /// Encode, write and flush one frame
    pub fn send(&mut self, id: u8, payload: &[u8]) -> Result<(), LinkError<T::Error>> {
        match write_frame(&mut self.bus, MAX_PAYLOAD, id, payload) {
            Ok(()) => {
                self.stats.frames_sent = self.stats.frames_sent.wrapping_add(1);
                Ok(())
            }
            Err(LinkError::Send(e)) => {
                debug!("push send of id {} refused: {}", id, e);
                self.stats.rejected = self.stats.rejected.wrapping_add(1);
                Err(LinkError::Send(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Feed one byte obtained elsewhere into this link's parser
    pub fn feed_byte(&mut self, byte: u8) -> Option<&Frame<MAX_PAYLOAD>> {
        self.stats.bytes_received = self.stats.bytes_received.wrapping_add(1);
        self.parser.feed(byte)
    }

    /// Read buffered bytes until `on_frame` returns `Some` or the
    /// transport runs dry
    ///
    /// Bytes after the frame that produced a result stay in the transport
    /// for the next call.
    pub fn poll_until<R, F>(&mut self, mut on_frame: F) -> Result<Option<R>, T::Error>
    where
        F: FnMut(&Frame<MAX_PAYLOAD>) -> Option<R>,
    {
        while self.bus.bytes_available() > 0 {
            let Some(byte) = self.bus.read_byte()? else {
                break;
            };
            self.stats.bytes_received = self.stats.bytes_received.wrapping_add(1);
            if let Some(frame) = self.parser.feed(byte) {
                if let Some(result) = on_frame(frame) {
                    return Ok(Some(result));
                }
            }
        }
        Ok(None)
    }

    /// Read all buffered bytes, returning the number of frames completed
    pub fn poll<F>(&mut self, mut on_frame: F) -> Result<usize, T::Error>
    where
        F: FnMut(&Frame<MAX_PAYLOAD>),
    {
        let mut frames = 0;
        self.poll_until(|frame| -> Option<()> {
            frames += 1;
            on_frame(frame);
            None
        })?;
        Ok(frames)
    }

    /// Link counters
    pub fn stats(&self) -> PushStats {
        self.stats
    }

    /// Parser sync-loss counters
    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Borrow the transport
    pub fn bus(&self) -> &T {
        &self.bus
    }

    /// Mutably borrow the transport
    pub fn bus_mut(&mut self) -> &mut T {
        &mut self.bus
    }
}
