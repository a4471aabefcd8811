use std::{net::IpAddr, time::Duration};

pub use clap::Parser;
use thiserror::Error;

use crate::{
    packets::{DEFAULT_PORT, DEFAULT_SENDER_TTL},
    sender::SenderConfig,
    stats::OutputFormat,
};

/// Errors found while validating a parsed configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Packet count must be at least 1")]
    ZeroCount,
    #[error("Receive timeout must be greater than zero")]
    ZeroTimeout,
    #[error("Remote address must not be empty")]
    EmptyRemoteAddr,
}

/// Command-line configuration of the Session-Sender.
#[derive(Parser, Debug, Clone)]
#[command(author = "Piotr Olszewski", version, about, long_about = None)]
pub struct Configuration {
    /// Host name or IP address of the Session-Reflector
    #[arg(short, long)]
    pub remote_addr: String,
    /// UDP port of the Session-Reflector
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub remote_port: u16,
    /// Local address to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    pub local_addr: IpAddr,
    /// Local UDP port (0 lets the OS choose)
    #[arg(short = 'o', long, default_value_t = 0)]
    pub local_port: u16,
    /// Number of test packets to send
    #[arg(short, long, default_value_t = 5)]
    pub count: u32,
    /// Delay between test packets in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    pub interval: u64,
    /// Time to wait for responses after the last packet, in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    pub timeout: u64,
    /// Session-Sender TTL written into test packets
    #[arg(long, default_value_t = DEFAULT_SENDER_TTL)]
    pub ttl: u8,
    /// Raw 16-bit error estimate written into test packets
    #[arg(short, long, default_value_t = 0)]
    pub error_estimate: u16,
    /// Format of the final statistics
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,
}

impl Configuration {
    /// Checks values clap cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.remote_addr.trim().is_empty() {
            return Err(ConfigurationError::EmptyRemoteAddr);
        }
        if self.count == 0 {
            return Err(ConfigurationError::ZeroCount);
        }
        if self.timeout == 0 {
            return Err(ConfigurationError::ZeroTimeout);
        }
        Ok(())
    }

    /// Parameters of the exchange itself.
    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            count: self.count,
            interval: Duration::from_millis(self.interval),
            timeout: Duration::from_millis(self.timeout),
            ttl: self.ttl,
            error_estimate: self.error_estimate,
        }
    }
}
