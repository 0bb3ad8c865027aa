//! Dual-bus router
//!
//! Merges frames from the push link and the pull-bus scheduler into one
//! stream for the control loop. Frames whose id is listed in
//! [`LinkConfig::change_ids`] are decoded into a [`Change`] and returned
//! to the caller; every other frame goes to the application's
//! [`FrameHandler`] as an opaque `(id, payload)` pair.
//!
//! # Receive order
//!
//! The pull bus is serviced first on every pass, whatever the priority,
//! so the master never finds the slave without a staged transaction. All
//! bytes of its completed transactions are parsed; if several changes
//! arrive, the last one is kept. With [`BusPriority::PullFirst`] a pull
//! change is returned without touching the push bus. Otherwise the push
//! bus is read until its first change, which is returned immediately and
//! leaves the remaining push bytes buffered for the next pass.

use twinbus_hal::{PullBus, PushBus};
use twinbus_protocol::messages::Heartbeat;
use twinbus_protocol::{
    Change, Frame, FrameError, LinkError, PacketId, Payload, QueueEncoder, QueueStats,
    RingBuffer, SendError,
};

use crate::config::{BusPriority, LinkConfig};
use crate::heartbeat::HeartbeatTimer;
use crate::link::PushLink;
use crate::scheduler::{PullBusScheduler, DEFAULT_TRANSACTION_SIZE};

/// Which bus a frame arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bus {
    Push,
    Pull,
}

/// Application dispatch for ordinary frames
pub trait FrameHandler {
    /// Handle one frame that is not a change event
    fn on_frame(&mut self, bus: Bus, id: u8, payload: &[u8]);
}

impl<F: FnMut(Bus, u8, &[u8])> FrameHandler for F {
    fn on_frame(&mut self, bus: Bus, id: u8, payload: &[u8]) {
        self(bus, id, payload)
    }
}

/// Router errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RouterError<PE, SE> {
    /// Push transport failed
    Push(PE),
    /// Pull transport failed
    Pull(SE),
    /// A frame was refused or only partly queued
    Send(SendError),
    /// A typed payload did not fit the payload cap
    Encode(FrameError),
}

/// Router counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RouterStats {
    /// Change events produced
    pub changes: u32,
    /// Frames passed to the handler
    pub dispatched: u32,
    /// Change-id frames whose payload failed to decode
    pub decode_failures: u32,
    /// Heartbeats sent
    pub heartbeats: u32,
}

/// Single logical channel over a push bus and a pull bus
pub struct DualBusRouter<
    'q,
    P,
    S,
    H,
    const MAX_PAYLOAD: usize,
    const QUEUE: usize,
    const TXN: usize = DEFAULT_TRANSACTION_SIZE,
> {
    push: PushLink<P, MAX_PAYLOAD>,
    pull: PullBusScheduler<'q, S, MAX_PAYLOAD, QUEUE, TXN>,
    encoder: QueueEncoder<'q, MAX_PAYLOAD, QUEUE>,
    handler: H,
    config: LinkConfig,
    heartbeat: HeartbeatTimer,
    stats: RouterStats,
}

impl<'q, P, S, H, const MAX_PAYLOAD: usize, const QUEUE: usize, const TXN: usize>
    DualBusRouter<'q, P, S, H, MAX_PAYLOAD, QUEUE, TXN>
where
    P: PushBus,
    S: PullBus,
    H: FrameHandler,
{
    /// Create a router over both transports
    ///
    /// `queue` is the pull-bus transmit ring; the router is both its
    /// producer and its consumer.
    pub fn new(push: P, pull: S, queue: &'q RingBuffer<QUEUE>, handler: H, config: LinkConfig) -> Self {
        Self {
            push: PushLink::new(push),
            pull: PullBusScheduler::new(pull, queue),
            encoder: QueueEncoder::new(queue),
            handler,
            heartbeat: HeartbeatTimer::new(config.heartbeat),
            config,
            stats: RouterStats::default(),
        }
    }

    /// Run one receive pass over both buses
    ///
    /// Returns the change event this pass produced, if any.
    pub fn receive(&mut self) -> Result<Option<Change>, RouterError<P::Error, S::Error>> {
        let Self {
            push,
            pull,
            handler,
            config,
            stats,
            ..
        } = self;

        let mut pull_change = None;
        pull.service(|frame| {
            if let Some(change) = route(config, handler, stats, Bus::Pull, frame) {
                pull_change = Some(change);
            }
        })
        .map_err(RouterError::Pull)?;

        if config.priority == BusPriority::PullFirst && pull_change.is_some() {
            return Ok(pull_change);
        }

        let push_change = push
            .poll_until(|frame| route(config, handler, stats, Bus::Push, frame))
            .map_err(RouterError::Push)?;

        Ok(push_change.or(pull_change))
    }

    /// Write one frame to the push bus
    pub fn send_push(&mut self, id: u8, payload: &[u8]) -> Result<(), LinkError<P::Error>> {
        self.push.send(id, payload)
    }

    /// Queue one frame for the pull-bus master
    pub fn send_pull(&mut self, id: u8, payload: &[u8]) -> Result<(), SendError> {
        let result = self.encoder.send(id, payload);
        if let Err(SendError::QueueFull { written }) = result {
            warn!("pull queue full: id {} truncated after {} bytes", id, written);
        }
        result
    }

    /// Send one frame on both buses
    ///
    /// Both buses are attempted even if the first fails; the push-bus
    /// error is reported first.
    pub fn broadcast(
        &mut self,
        id: u8,
        payload: &[u8],
    ) -> Result<(), RouterError<P::Error, S::Error>> {
        let pushed = self.send_push(id, payload);
        let queued = self.send_pull(id, payload);
        match pushed {
            Err(LinkError::Transport(e)) => return Err(RouterError::Push(e)),
            Err(LinkError::Send(e)) => return Err(RouterError::Send(e)),
            Ok(()) => {}
        }
        queued.map_err(RouterError::Send)
    }

    /// Encode a typed payload and send it on both buses
    pub fn broadcast_payload<T: Payload>(
        &mut self,
        id: u8,
        payload: &T,
    ) -> Result<(), RouterError<P::Error, S::Error>> {
        let mut buf = [0u8; MAX_PAYLOAD];
        let bytes = payload.encode(&mut buf).map_err(RouterError::Encode)?;
        self.broadcast(id, bytes)
    }

    /// Send a heartbeat on both buses if one is due at `now_ms`
    ///
    /// Returns true if a heartbeat went out.
    pub fn tick(&mut self, now_ms: u32) -> Result<bool, RouterError<P::Error, S::Error>> {
        if !self.heartbeat.poll(now_ms) {
            return Ok(false);
        }
        let beat = Heartbeat {
            beat: self.heartbeat.beat(),
        };
        self.broadcast_payload(PacketId::Heartbeat.to_byte(), &beat)?;
        self.stats.heartbeats = self.stats.heartbeats.wrapping_add(1);
        Ok(true)
    }

    /// Router counters
    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Pull-queue producer counters
    pub fn queue_stats(&self) -> QueueStats {
        self.encoder.stats()
    }

    /// Active configuration
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// The push link
    pub fn push(&self) -> &PushLink<P, MAX_PAYLOAD> {
        &self.push
    }

    /// Mutable access to the push link
    pub fn push_mut(&mut self) -> &mut PushLink<P, MAX_PAYLOAD> {
        &mut self.push
    }

    /// The pull-bus scheduler
    pub fn pull(&self) -> &PullBusScheduler<'q, S, MAX_PAYLOAD, QUEUE, TXN> {
        &self.pull
    }

    /// Mutable access to the pull-bus scheduler
    pub fn pull_mut(&mut self) -> &mut PullBusScheduler<'q, S, MAX_PAYLOAD, QUEUE, TXN> {
        &mut self.pull
    }

    /// The application handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the application handler
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

/// Turn a change-id frame into a [`Change`], or hand the frame to `handler`
fn route<H: FrameHandler, const MAX_PAYLOAD: usize>(
    config: &LinkConfig,
    handler: &mut H,
    stats: &mut RouterStats,
    bus: Bus,
    frame: &Frame<MAX_PAYLOAD>,
) -> Option<Change> {
    if !config.is_change_id(frame.id) {
        handler.on_frame(bus, frame.id, &frame.payload);
        stats.dispatched = stats.dispatched.wrapping_add(1);
        return None;
    }

    match Change::from_frame(frame) {
        Ok(change) => {
            debug!("change from {}: {}", bus, change);
            stats.changes = stats.changes.wrapping_add(1);
            Some(change)
        }
        Err(e) => {
            warn!("dropping id {} from {}: {}", frame.id, bus, e);
            stats.decode_failures = stats.decode_failures.wrapping_add(1);
            None
        }
    }
}
