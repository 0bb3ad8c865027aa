//! Packet ids and typed payloads
//!
//! Payloads are fixed-layout little-endian records. Decoding is explicit
//! and checked: a payload of the wrong size or with an invalid field
//! (e.g. a bool byte other than 0/1) is a [`DecodeError`], never a
//! reinterpretation of raw bytes.
//!
//! The layouts match postcard's encoding of these structs: `bool` is one
//! byte, `f32` is four little-endian bytes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::frame::{Frame, FrameError};

/// Packet identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketId {
    /// Drill servo command
    ServoDrill,
    /// Drill servo status
    ServoDrillResponse,
    /// Camera servo command
    ServoCam,
    /// Camera servo status
    ServoCamResponse,
    /// Drill load cell reading
    MassDrill,
    /// Drill load cell tare/scale request
    MassDrillRequest,
    /// HD load cell reading
    MassHd,
    /// HD load cell tare/scale request
    MassHdRequest,
    /// LED strip 0 pattern
    Led0,
    /// LED strip 1 pattern
    Led1,
    /// Four-in-one soil sensor reading
    FourInOne,
    /// NPK sensor reading
    Npk,
    /// Particulate sensor reading
    DustData,
    /// Link heartbeat
    Heartbeat,
}

// Wire format values
const ID_SERVO_DRILL: u8 = 1;
const ID_SERVO_DRILL_RESPONSE: u8 = 2;
const ID_SERVO_CAM: u8 = 3;
const ID_SERVO_CAM_RESPONSE: u8 = 4;
const ID_MASS_DRILL: u8 = 5;
const ID_MASS_DRILL_REQUEST: u8 = 6;
const ID_MASS_HD: u8 = 7;
const ID_MASS_HD_REQUEST: u8 = 8;
const ID_LED0: u8 = 11;
const ID_LED1: u8 = 12;
const ID_FOUR_IN_ONE: u8 = 13;
const ID_NPK: u8 = 14;
const ID_DUST_DATA: u8 = 15;
const ID_HEARTBEAT: u8 = 20;

/// Payload byte carried by every heartbeat
pub const HEARTBEAT_BEAT: u8 = 10;

impl PacketId {
    /// Parse an id from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            ID_SERVO_DRILL => Some(PacketId::ServoDrill),
            ID_SERVO_DRILL_RESPONSE => Some(PacketId::ServoDrillResponse),
            ID_SERVO_CAM => Some(PacketId::ServoCam),
            ID_SERVO_CAM_RESPONSE => Some(PacketId::ServoCamResponse),
            ID_MASS_DRILL => Some(PacketId::MassDrill),
            ID_MASS_DRILL_REQUEST => Some(PacketId::MassDrillRequest),
            ID_MASS_HD => Some(PacketId::MassHd),
            ID_MASS_HD_REQUEST => Some(PacketId::MassHdRequest),
            ID_LED0 => Some(PacketId::Led0),
            ID_LED1 => Some(PacketId::Led1),
            ID_FOUR_IN_ONE => Some(PacketId::FourInOne),
            ID_NPK => Some(PacketId::Npk),
            ID_DUST_DATA => Some(PacketId::DustData),
            ID_HEARTBEAT => Some(PacketId::Heartbeat),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            PacketId::ServoDrill => ID_SERVO_DRILL,
            PacketId::ServoDrillResponse => ID_SERVO_DRILL_RESPONSE,
            PacketId::ServoCam => ID_SERVO_CAM,
            PacketId::ServoCamResponse => ID_SERVO_CAM_RESPONSE,
            PacketId::MassDrill => ID_MASS_DRILL,
            PacketId::MassDrillRequest => ID_MASS_DRILL_REQUEST,
            PacketId::MassHd => ID_MASS_HD,
            PacketId::MassHdRequest => ID_MASS_HD_REQUEST,
            PacketId::Led0 => ID_LED0,
            PacketId::Led1 => ID_LED1,
            PacketId::FourInOne => ID_FOUR_IN_ONE,
            PacketId::Npk => ID_NPK,
            PacketId::DustData => ID_DUST_DATA,
            PacketId::Heartbeat => ID_HEARTBEAT,
        }
    }
}

/// Payload decode failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Payload size does not match the record layout
    WrongLength { expected: usize, actual: usize },
    /// A field held a value its type cannot represent
    Malformed,
}

/// A fixed-layout payload record
pub trait Payload: Serialize + DeserializeOwned {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decode from raw payload bytes
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != Self::SIZE {
            return Err(DecodeError::WrongLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let (value, rest) =
            postcard::take_from_bytes(bytes).map_err(|_| DecodeError::Malformed)?;
        if !rest.is_empty() {
            return Err(DecodeError::Malformed);
        }
        Ok(value)
    }

    /// Decode the payload of a received frame
    fn from_frame<const MAX_PAYLOAD: usize>(
        frame: &Frame<MAX_PAYLOAD>,
    ) -> Result<Self, DecodeError> {
        Self::decode(&frame.payload)
    }

    /// Encode into `buf`, returning the written prefix
    fn encode<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], FrameError> {
        postcard::to_slice(self, buf).map_err(|_| FrameError::BufferTooSmall)
    }
}

/// Tare/scale request for one load cell
///
/// Packed to 5 bytes: tare flag, then scale. A host that sends a C struct
/// `{ bool; float; }` without packing puts three padding bytes after the
/// flag and sends 8 bytes; those frames fail with
/// [`DecodeError::WrongLength`] until the host packs the struct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MassRequest {
    /// Zero the scale at its current reading
    pub tare: bool,
    /// New scale factor
    pub scale: f32,
}

impl Payload for MassRequest {
    const SIZE: usize = 5;
}

/// Servo angle command
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoRequest {
    /// Target angle in degrees
    pub angle: f32,
}

impl Payload for ServoRequest {
    const SIZE: usize = 4;
}

/// Heartbeat body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Heartbeat {
    pub beat: u8,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            beat: HEARTBEAT_BEAT,
        }
    }
}

impl Payload for Heartbeat {
    const SIZE: usize = 1;
}
