//! Tare/scale change events
//!
//! A mass request frame is not dispatched like other packets; the router
//! turns it into a [`Change`] and hands it straight back to the control
//! loop.

use crate::frame::Frame;
use crate::messages::{DecodeError, MassRequest, Payload};

/// Tare/scale change requested by the host
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Change {
    /// Id of the request frame (selects which load cell)
    pub id: u8,
    /// Zero the scale at its current reading
    pub tare_requested: bool,
    /// Requested scale factor
    pub scale: f32,
}

impl Change {
    /// Build a change from a decoded request
    pub fn from_request(id: u8, request: &MassRequest) -> Self {
        Self {
            id,
            tare_requested: request.tare,
            scale: request.scale,
        }
    }

    /// Decode a change from a mass request frame
    pub fn from_frame<const MAX_PAYLOAD: usize>(
        frame: &Frame<MAX_PAYLOAD>,
    ) -> Result<Self, DecodeError> {
        let request = MassRequest::from_frame(frame)?;
        Ok(Self::from_request(frame.id, &request))
    }
}
