//! Board-agnostic link engine for the twinbus protocol
//!
//! This crate ties the wire protocol to the bus traits:
//!
//! - Push link (write-and-flush sends, non-blocking receive)
//! - Pull-bus scheduler (one aligned transaction in flight)
//! - Dual-bus router (change events, handler dispatch, heartbeat)
//! - Runtime configuration and persistence

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod heartbeat;
pub mod link;
pub mod router;
pub mod scheduler;

#[cfg(test)]
mod mock;

pub use config::{BusPriority, ConfigError, HeartbeatConfig, LinkConfig};
pub use heartbeat::HeartbeatTimer;
pub use link::{PushLink, PushStats};
pub use router::{Bus, DualBusRouter, FrameHandler, RouterError, RouterStats};
pub use scheduler::{PullBusScheduler, SchedulerStats};
pub use twinbus_protocol::{Change, LinkError, SendError};
