use std::{collections::HashMap, future::Future, io, net::SocketAddr, time::Duration};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::{net::UdpSocket, time};

use crate::{
    packets::{PacketError, StampPacket, DEFAULT_SENDER_TTL},
    stats::RttSample,
    time::{from_ntp, to_ntp},
};

/// Largest datagram the receive phase reads in one call.
const RECV_BUFFER_SIZE: usize = 1500;

/// Byte-oriented duplex channel to a single reflector.
///
/// One call to `send` carries one probe; one call to `recv` yields one
/// response. A connected [`UdpSocket`] is the production implementation.
pub trait Transport {
    fn send(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

impl Transport for UdpSocket {
    fn send(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send {
        UdpSocket::send(self, buf)
    }

    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send {
        UdpSocket::recv(self, buf)
    }
}

/// Errors that prevent an exchange from starting at all.
#[derive(Error, Debug)]
pub enum SenderError {
    #[error("cannot resolve {target}: {source}")]
    Resolve { target: String, source: io::Error },
    #[error("no address found for {0}")]
    NoAddress(String),
    #[error("cannot bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: io::Error,
    },
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: io::Error,
    },
}

/// Resolves `host:port`, preferring an address of the same family as `local`.
pub async fn resolve_remote(
    host: &str,
    port: u16,
    local: &SocketAddr,
) -> Result<SocketAddr, SenderError> {
    let target = format!("{}:{}", host, port);
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| SenderError::Resolve {
            target: target.clone(),
            source,
        })?
        .collect();

    candidates
        .iter()
        .find(|addr| addr.is_ipv4() == local.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or(SenderError::NoAddress(target))
}

/// Binds a UDP socket on `local` and connects it to `remote`.
pub async fn connect_socket(local: SocketAddr, remote: SocketAddr) -> Result<UdpSocket, SenderError> {
    let socket = UdpSocket::bind(local)
        .await
        .map_err(|source| SenderError::Bind { addr: local, source })?;
    socket
        .connect(remote)
        .await
        .map_err(|source| SenderError::Connect {
            addr: remote,
            source,
        })?;
    Ok(socket)
}

/// Parameters of one exchange run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderConfig {
    /// Number of probes to send, numbered `0..count`.
    pub count: u32,
    /// Pause after each probe.
    pub interval: Duration,
    /// How long to keep listening once the last probe went out.
    pub timeout: Duration,
    /// Session-Sender TTL written into every probe.
    pub ttl: u8,
    /// Error estimate written into every probe, opaque to this crate.
    pub error_estimate: u16,
}

impl Default for SenderConfig {
    fn default() -> Self {
        SenderConfig {
            count: 5,
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
            ttl: DEFAULT_SENDER_TTL,
            error_estimate: 0,
        }
    }
}

/// Per-packet problem observed during an exchange. None of these abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Writing probe `seq` failed. The probe still counts as sent.
    SendFailed { seq: u32, kind: io::ErrorKind },
    /// A read failed for a reason other than the receive deadline.
    ReceiveFailed { kind: io::ErrorKind },
    /// A datagram of `len` bytes could not be decoded.
    DecodeFailed { len: usize, error: PacketError },
    /// A response named a sequence that is not pending (unknown or duplicate).
    UnexpectedSequence { seq: u32 },
}

/// Outcome of one exchange run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeResult {
    /// Probes sent, always the configured count.
    pub sent: u32,
    /// Responses matched to a pending probe.
    pub received: u32,
    /// One sample per matched response, in arrival order.
    pub samples: Vec<RttSample>,
    /// Per-packet problems in the order they happened.
    pub diagnostics: Vec<Diagnostic>,
}

/// STAMP Session-Sender driving a send phase followed by a receive phase.
pub struct SessionSender<T> {
    transport: T,
    config: SenderConfig,
    clock: fn() -> DateTime<Utc>,
}

impl<T: Transport> SessionSender<T> {
    /// Creates a sender that samples time from the system wall clock.
    pub fn new(transport: T, config: SenderConfig) -> Self {
        Self::with_clock(transport, config, Utc::now)
    }

    /// Creates a sender with a custom wall-clock source.
    pub fn with_clock(transport: T, config: SenderConfig, clock: fn() -> DateTime<Utc>) -> Self {
        SessionSender {
            transport,
            config,
            clock,
        }
    }

    /// Releases the transport once the sender is no longer needed.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Runs one exchange: sends every probe, then collects responses until
    /// all probes are matched or the receive deadline passes.
    ///
    /// The phases never overlap. Responses that arrive while probes are still
    /// going out wait in the transport until the receive phase starts.
    pub async fn run(&self) -> ExchangeResult {
        let mut diagnostics = Vec::new();

        let mut pending = self.send_phase(&mut diagnostics).await;
        let samples = self.receive_phase(&mut pending, &mut diagnostics).await;

        if !pending.is_empty() {
            log::info!("{} probe(s) unanswered before the deadline", pending.len());
        }

        ExchangeResult {
            sent: self.config.count,
            received: samples.len() as u32,
            samples,
            diagnostics,
        }
    }

    async fn send_phase(&self, diagnostics: &mut Vec<Diagnostic>) -> HashMap<u32, DateTime<Utc>> {
        let mut pending = HashMap::new();

        for seq in 0..self.config.count {
            let t1 = (self.clock)();
            let packet = StampPacket::probe(
                seq,
                to_ntp(t1),
                self.config.error_estimate,
                self.config.ttl,
            );

            // Recorded before the write so a failed write still counts as sent and lost.
            pending.insert(seq, t1);

            if let Err(e) = self.transport.send(&packet.to_bytes()).await {
                log::warn!("Failed to send packet {}: {}", seq, e);
                diagnostics.push(Diagnostic::SendFailed {
                    seq,
                    kind: e.kind(),
                });
            } else {
                log::debug!("sent seq={} t1={}", seq, t1);
            }

            time::sleep(self.config.interval).await;
        }

        pending
    }

    async fn receive_phase(
        &self,
        pending: &mut HashMap<u32, DateTime<Utc>>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<RttSample> {
        let mut samples = Vec::new();
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        // One absolute deadline for the whole phase; it does not slide per packet.
        let deadline = time::Instant::now() + self.config.timeout;

        while !pending.is_empty() {
            let len = match time::timeout_at(deadline, self.transport.recv(&mut buf)).await {
                Err(_) => {
                    log::debug!("receive deadline reached");
                    break;
                }
                Ok(Err(e)) => {
                    log::warn!("Receive error: {}", e);
                    diagnostics.push(Diagnostic::ReceiveFailed { kind: e.kind() });
                    continue;
                }
                Ok(Ok(len)) => len,
            };
            let t4 = (self.clock)();

            let response = match StampPacket::from_bytes(&buf[..len]) {
                Ok(packet) => packet,
                Err(error) => {
                    log::warn!("Failed to decode response: {}", error);
                    log::debug!("undecodable datagram: {:02x?}", &buf[..len]);
                    diagnostics.push(Diagnostic::DecodeFailed { len, error });
                    continue;
                }
            };

            let seq = response.sess_sender_seq_number;
            let Some(t1) = pending.remove(&seq) else {
                log::warn!("Received response for unexpected sequence number: {}", seq);
                diagnostics.push(Diagnostic::UnexpectedSequence { seq });
                continue;
            };
            if response.sess_sender_timestamp != to_ntp(t1) {
                log::warn!("seq={} echoes a sender timestamp that was never sent", seq);
            }

            let rtt = response.rtt(t4);
            // i64 nanoseconds cover about 292 years
            let rtt_ns = rtt.num_nanoseconds().unwrap_or(i64::MAX);
            log::info!(
                "seq={} rtt={:.3}ms ttl={}",
                seq,
                rtt_ns as f64 / 1_000_000.0,
                response.sess_sender_ttl
            );
            log::debug!(
                "T1={} T2={} T3={} T4={}",
                from_ntp(response.sess_sender_timestamp),
                from_ntp(response.receive_timestamp),
                from_ntp(response.timestamp),
                t4
            );

            samples.push(RttSample {
                seq,
                rtt_ns,
                ttl: response.sess_sender_ttl,
            });
        }

        samples
    }
}
