//! Twinbus bus transport abstractions
//!
//! This crate defines the two transport traits the framed link runs on.
//! Chip-specific code implements them; the protocol engine only ever
//! calls through these traits, so the same engine runs on any board.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / control loop             │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  twinbus-core (router, scheduler)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │   PushBus     │       │   PullBus     │
//! │ (UART-like)   │       │ (SPI slave)   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`push::PushBus`] - Byte stream the local side may write at will
//! - [`pull::PullBus`] - Externally clocked transactions (local side is slave)

#![no_std]
#![deny(unsafe_code)]

pub mod pull;
pub mod push;

// Re-export key traits at crate root for convenience
pub use pull::PullBus;
pub use push::PushBus;
