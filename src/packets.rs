//! STAMP packet structure as defined in RFC 8762.
//!
//! A single 44-byte layout serves both directions of the unauthenticated
//! exchange: the Session-Sender emits it with the response-only fields zeroed,
//! and the Session-Reflector returns it with those fields filled in.

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::time::from_ntp;

/// Size in bytes of an encoded unauthenticated STAMP packet.
pub const STAMP_PACKET_SIZE: usize = 44;

/// Well-known UDP port used by STAMP and TWAMP-Light reflectors.
pub const DEFAULT_PORT: u16 = 6000;

/// Session-Sender TTL written into outgoing probes unless configured otherwise.
pub const DEFAULT_SENDER_TTL: u8 = 64;

/// Errors raised while decoding wire bytes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("buffer of {len} bytes is too small for a STAMP packet ({} bytes)", STAMP_PACKET_SIZE)]
    BufferTooShort { len: usize },
}

/// Unauthenticated STAMP packet (RFC 8762 Section 4.3.1).
///
/// Wire format:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                        Sequence Number                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          Timestamp                           |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Error Estimate        |           MBZ                 |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Receive Timestamp                       |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                  Session-Sender Seq Number                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                  Session-Sender Timestamp                     |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Session-Sender Error Estimate |           MBZ                 |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |Ses-Sender TTL |                      MBZ                      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The MBZ fields keep whatever a peer sent when decoding; encoding always
/// writes zeros there.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct StampPacket {
    /// Sequence number set by the current sender of this packet.
    pub sequence_number: u32,
    /// Time this packet left its sender (T1 for probes, T3 for responses).
    pub timestamp: u64,
    /// Synchronization error estimate, passed through opaquely.
    pub error_estimate: u16,
    /// Must Be Zero - reserved.
    pub mbz1: u16,
    /// Time the reflector received the probe (T2). Zero in probes.
    pub receive_timestamp: u64,
    /// Sequence number of the probe this response answers.
    pub sess_sender_seq_number: u32,
    /// Send time of the probe this response answers (T1). Zero in probes.
    pub sess_sender_timestamp: u64,
    /// Error estimate of the probe this response answers.
    pub sess_sender_err_estimate: u16,
    /// Must Be Zero - reserved.
    pub mbz2: u16,
    /// TTL of the probe as seen by the reflector, or the originating TTL.
    pub sess_sender_ttl: u8,
    /// Must Be Zero - reserved (3 bytes).
    pub mbz3: [u8; 3],
}

impl StampPacket {
    /// Builds a Session-Sender probe. Response-only fields are zero.
    pub fn probe(sequence_number: u32, timestamp: u64, error_estimate: u16, ttl: u8) -> Self {
        StampPacket {
            sequence_number,
            timestamp,
            error_estimate,
            sess_sender_ttl: ttl,
            ..Default::default()
        }
    }

    /// Serializes the packet to a 44-byte array in big-endian wire format.
    pub fn to_bytes(&self) -> [u8; STAMP_PACKET_SIZE] {
        let mut buf = [0u8; STAMP_PACKET_SIZE];
        buf[0..4].copy_from_slice(&self.sequence_number.to_be_bytes());
        buf[4..12].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[12..14].copy_from_slice(&self.error_estimate.to_be_bytes());
        buf[16..24].copy_from_slice(&self.receive_timestamp.to_be_bytes());
        buf[24..28].copy_from_slice(&self.sess_sender_seq_number.to_be_bytes());
        buf[28..36].copy_from_slice(&self.sess_sender_timestamp.to_be_bytes());
        buf[36..38].copy_from_slice(&self.sess_sender_err_estimate.to_be_bytes());
        buf[40] = self.sess_sender_ttl;
        buf
    }

    /// Deserializes a packet from big-endian wire format.
    ///
    /// Trailing bytes past the 44th are ignored; MBZ bytes are not validated.
    ///
    /// # Errors
    /// Returns [`PacketError::BufferTooShort`] if the buffer is smaller than 44 bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, PacketError> {
        let buf: &[u8; STAMP_PACKET_SIZE] = buf
            .get(..STAMP_PACKET_SIZE)
            .and_then(|head| head.try_into().ok())
            .ok_or(PacketError::BufferTooShort { len: buf.len() })?;

        Ok(Self {
            sequence_number: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            timestamp: read_u64(buf, 4),
            error_estimate: u16::from_be_bytes([buf[12], buf[13]]),
            mbz1: u16::from_be_bytes([buf[14], buf[15]]),
            receive_timestamp: read_u64(buf, 16),
            sess_sender_seq_number: u32::from_be_bytes([buf[24], buf[25], buf[26], buf[27]]),
            sess_sender_timestamp: read_u64(buf, 28),
            sess_sender_err_estimate: u16::from_be_bytes([buf[36], buf[37]]),
            mbz2: u16::from_be_bytes([buf[38], buf[39]]),
            sess_sender_ttl: buf[40],
            mbz3: [buf[41], buf[42], buf[43]],
        })
    }

    /// Computes the round-trip time of a reflected packet received at `t4`.
    ///
    /// `RTT = (T4 - T1) - (T3 - T2)`, where T1 is the echoed sender timestamp,
    /// T2 the reflector receive timestamp and T3 this packet's own timestamp.
    /// A constant offset between the two clocks cancels out; rate drift does
    /// not. The reflector residence time `T3 - T2` may be negative and is
    /// subtracted as is.
    pub fn rtt(&self, t4: DateTime<Utc>) -> TimeDelta {
        let t1 = from_ntp(self.sess_sender_timestamp);
        let t2 = from_ntp(self.receive_timestamp);
        let t3 = from_ntp(self.timestamp);

        (t4 - t1) - (t3 - t2)
    }
}

fn read_u64(buf: &[u8; STAMP_PACKET_SIZE], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}
