use crate::measure::{Bandwidth, Latency};
use std::time::Duration;

/// Default [`Latency`] of a [`Link`]: the one-way propagation delay of
/// the reference point-to-point path.
///
/// ```
/// # use latprobe_core::defaults::*;
/// assert_eq!(
///     DEFAULT_LATENCY.to_string(),
///     "30µs"
/// );
/// ```
///
/// [`Link`]: crate::link::Link
pub const DEFAULT_LATENCY: Latency = Latency::new(Duration::from_micros(30));

/// Default [`Bandwidth`] of a [`Link`].
///
/// ```
/// # use latprobe_core::defaults::*;
/// assert_eq!(
///     DEFAULT_BANDWIDTH.to_string(),
///     "1gbps"
/// );
/// ```
///
/// [`Link`]: crate::link::Link
pub const DEFAULT_BANDWIDTH: Bandwidth = Bandwidth::new(1_000_000_000);

/// Largest payload, in bytes, a single transport segment may carry.
pub const DEFAULT_SEGMENT_SIZE: usize = 536;

/// Bytes added on the wire to every segment: IPv4 (20) + TCP (20) + PPP (2).
///
/// Handshake segments (SYN, SYN-ACK, RST) are made of this overhead only.
pub const DEFAULT_HEADER_OVERHEAD: u64 = 42;

/// Delay before a lost segment is transmitted again.
pub const DEFAULT_RETRANSMISSION_TIMEOUT: Duration = Duration::from_secs(1);

/// Number of times a lost SYN (or SYN-ACK) is retried before the
/// connection attempt is declared timed out.
pub const DEFAULT_SYN_RETRIES: u32 = 6;

/// Number of times a lost data segment is retried before the connection
/// is aborted.
pub const DEFAULT_DATA_RETRIES: u32 = 6;

/// First port handed out to connection endpoints that do not bind to a
/// particular local address.
pub const EPHEMERAL_PORT_START: u16 = 49_153;
