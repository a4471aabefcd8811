//! STAMP Sender - Simple Two-Way Active Measurement Protocol Session-Sender.
//!
//! This crate sends a burst of unauthenticated STAMP test packets (RFC 8762) to
//! a Session-Reflector, matches the reflected packets by sequence number and
//! reports packet loss, round-trip time and jitter.
//!
//! # Usage
//!
//! ```bash
//! stamp-sender --remote-addr 192.168.1.1 --remote-port 6000 --count 10 --interval 200
//! ```

/// Command-line configuration and validation.
pub mod configuration;
/// STAMP packet structure and serialization.
pub mod packets;
/// Session Sender implementation.
pub mod sender;
/// Loss, RTT and jitter statistics.
pub mod stats;
/// NTP timestamp conversion.
pub mod time;
