//! LoRaWAN device-session core in Rust
//!
//! This crate sits above an external LoRaWAN MAC engine and owns the parts of
//! a device session the engine leaves to the application:
//! - Incremental, checksum-validated persistence of the engine's seven NVM groups
//! - The OTAA/ABP join lifecycle with bounded, randomized retransmission
//! - Region switching with a partial factory reset that survives reboot
//! - Deferring engine work requested from interrupt context to the main loop
//!
//! # Features
//! - `no_std`, no heap allocation
//! - Interrupt-safe signalling through `critical-section`
//! - Engine, flash, timer and console are traits supplied by the host
//! - Optional `defmt` logging
//!
//! # Example
//! ```ignore
//! use lorawan_session::{config::SessionConfig, device::Session, signals::Signals};
//!
//! static SIGNALS: Signals = Signals::new();
//!
//! let mut session = Session::new(engine, platform, timer, console, &SIGNALS, SessionConfig::default());
//! session.init().ok();
//! session.request_join(3).unwrap();
//!
//! loop {
//!     session.process();
//!     if !SIGNALS.sleep_inhibited() {
//!         // enter low power mode
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![no_std]

/// Session and device configuration
pub mod config;

/// High-level session interface
pub mod device;

/// MAC engine adapter
pub mod engine;

/// Crate error type
pub mod error;

/// Device identity resolution
pub mod identity;

/// Join orchestration
pub mod join;

/// Application notifications
pub mod notify;

/// Non-volatile state groups and their persistence
pub mod nvm;

/// Platform services (flash, CRC, unique id, randomness)
pub mod platform;

/// Radio hardware abstraction
pub mod radio;

/// Regional parameters and region switching
pub mod region;

/// Interrupt-safe signals shared with the main loop
pub mod signals;

pub use device::Session;
pub use error::Error;
