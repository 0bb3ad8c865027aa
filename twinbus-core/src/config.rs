//! Link configuration
//!
//! Compile-time sizes (payload cap, queue and transaction sizes) are const
//! generics on the engine types. Runtime policy lives in [`LinkConfig`],
//! which can be persisted as postcard binary data.

use heapless::Vec;
use serde::{Deserialize, Serialize};
use twinbus_protocol::PacketId;

/// Maximum number of ids that produce [`twinbus_protocol::Change`] events
pub const MAX_CHANGE_IDS: usize = 4;

/// Current persisted config layout version
pub const CONFIG_VERSION: u8 = 1;

/// Default heartbeat period
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u32 = 500;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Output buffer too small
    Serialize,
    /// Stored bytes are not a valid config
    Deserialize,
    /// Stored config was written by a different layout version
    Version(u8),
    /// More change ids than [`MAX_CHANGE_IDS`]
    TooManyChangeIds,
}

/// Which bus a receive pass favours
///
/// The pull bus is serviced on every pass under both policies so the
/// master always finds a transaction armed; the policy only decides whose
/// change event wins and whether push bytes are read when the pull bus
/// already produced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusPriority {
    /// Return a pull-bus change without reading the push bus
    #[default]
    PullFirst,
    /// Read the push bus too; its change wins over the pull bus's
    PushFirst,
}

/// Heartbeat settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeartbeatConfig {
    /// Send heartbeats at all
    pub enabled: bool,
    /// Period in milliseconds
    pub interval_ms: u32,
    /// Payload byte
    pub beat: u8,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            beat: twinbus_protocol::messages::HEARTBEAT_BEAT,
        }
    }
}

/// Runtime link policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Bus priority for change events
    pub priority: BusPriority,
    /// Heartbeat settings
    pub heartbeat: HeartbeatConfig,
    /// Ids decoded as tare/scale changes instead of being dispatched
    pub change_ids: Vec<u8, MAX_CHANGE_IDS>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let mut change_ids = Vec::new();
        // Capacity is well above two
        let _ = change_ids.push(PacketId::MassDrillRequest.to_byte());
        let _ = change_ids.push(PacketId::MassHdRequest.to_byte());
        Self {
            priority: BusPriority::default(),
            heartbeat: HeartbeatConfig::default(),
            change_ids,
        }
    }
}

impl LinkConfig {
    /// Replace the change ids
    pub fn with_change_ids(mut self, ids: &[u8]) -> Result<Self, ConfigError> {
        self.change_ids = Vec::from_slice(ids).map_err(|_| ConfigError::TooManyChangeIds)?;
        Ok(self)
    }

    /// Set the bus priority
    pub fn with_priority(mut self, priority: BusPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Returns true if frames with `id` become change events
    pub fn is_change_id(&self, id: u8) -> bool {
        self.change_ids.contains(&id)
    }

    /// Serialize to postcard binary, prefixed by [`CONFIG_VERSION`]
    pub fn to_bytes<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(&(CONFIG_VERSION, self), buf).map_err(|_| ConfigError::Serialize)
    }

    /// Load from postcard binary written by [`LinkConfig::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let (version, rest): (u8, &[u8]) =
            postcard::take_from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;
        if version != CONFIG_VERSION {
            return Err(ConfigError::Version(version));
        }
        postcard::from_bytes(rest).map_err(|_| ConfigError::Deserialize)
    }
}
