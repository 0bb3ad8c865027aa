//! Twinbus wire protocol
//!
//! This crate defines the framing shared by both buses of the link: a
//! push bus the device writes at will (UART) and a pull bus the remote
//! master clocks (SPI, device is slave). Both carry identical frames so
//! the rest of the firmware never cares where a packet came from.
//!
//! # Protocol Overview
//!
//! ```text
//! ┌──────┬──────┬────────┬──────┬──────────────┬────────┐
//! │ 0xA5 │ 0x5A │ LENGTH │ ID   │ PAYLOAD      │ CRC16  │
//! │ 1B   │ 1B   │ 2B LE  │ 1B   │ LENGTH-1 B   │ 2B LE  │
//! └──────┴──────┴────────┴──────┴──────────────┴────────┘
//! ```
//!
//! LENGTH counts ID + PAYLOAD. The CRC covers ID + PAYLOAD. The receiver
//! resynchronises on the two marker bytes after any noise, bad length or
//! checksum failure. There is no retransmission.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod change;
pub mod crc;
pub mod encoder;
pub mod frame;
pub mod messages;
pub mod ring;

pub use change::Change;
pub use crc::crc16;
pub use encoder::{
    queue_capacity_for, validate_payload, write_frame, LinkError, QueueEncoder, QueueStats,
    SendError,
};
pub use frame::{
    max_frame_size, Frame, FrameError, FrameParser, ParserState, ParserStats, WireBytes,
    DEFAULT_MAX_PAYLOAD, FRAME_OVERHEAD, FRAME_STX1, FRAME_STX2,
};
pub use messages::{DecodeError, PacketId, Payload};
pub use ring::RingBuffer;
