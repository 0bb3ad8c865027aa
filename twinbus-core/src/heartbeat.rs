//! Heartbeat timing
//!
//! The control loop passes a free-running millisecond clock; the timer
//! fires once per configured interval. Clock wraparound is handled with
//! wrapping arithmetic.

use crate::config::HeartbeatConfig;

/// Periodic heartbeat trigger
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeartbeatTimer {
    config: HeartbeatConfig,
    last_ms: u32,
}

impl HeartbeatTimer {
    /// Create a timer; the first beat is due one interval after time zero
    pub fn new(config: HeartbeatConfig) -> Self {
        Self { config, last_ms: 0 }
    }

    /// Returns true if a heartbeat is due at `now_ms`, and restarts the period
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if !self.config.enabled {
            return false;
        }
        if now_ms.wrapping_sub(self.last_ms) >= self.config.interval_ms {
            self.last_ms = now_ms;
            return true;
        }
        false
    }

    /// Payload byte to send
    pub fn beat(&self) -> u8 {
        self.config.beat
    }
}
