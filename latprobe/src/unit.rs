use latprobe_core::time::SimTime;

/// Number of bytes of the send timestamp at the head of every unit.
pub const TIMESTAMP_LEN: usize = 8;

/// One fixed-size datum sent by the [`PacedSender`].
///
/// The first [`TIMESTAMP_LEN`] bytes are the simulated send time in
/// nanoseconds, as a little-endian `u64`. The rest is zeroes.
///
/// ```
/// # use latprobe::unit::{Unit, decode_timestamp};
/// # use latprobe_core::time::SimTime;
/// let sent_at = SimTime::from_nanos(2_000_060_672);
/// let unit = Unit::stamped(sent_at, 100);
///
/// assert_eq!(unit.len(), 100);
/// assert_eq!(decode_timestamp(unit.as_bytes()), Some(sent_at));
/// ```
///
/// [`PacedSender`]: crate::sender::PacedSender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit(Vec<u8>);

impl Unit {
    /// Build a unit of `size` bytes carrying `sent_at`.
    ///
    /// A `size` smaller than [`TIMESTAMP_LEN`] truncates the timestamp.
    /// The sender never does that: it refuses such a configuration.
    pub fn stamped(sent_at: SimTime, size: usize) -> Self {
        let mut bytes = vec![0; size];
        let stamp = sent_at.as_nanos().to_le_bytes();
        let len = size.min(TIMESTAMP_LEN);
        bytes[..len].copy_from_slice(&stamp[..len]);
        Self(bytes)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Read the send timestamp at the head of `chunk`.
///
/// Returns `None` if the chunk is shorter than [`TIMESTAMP_LEN`].
pub fn decode_timestamp(chunk: &[u8]) -> Option<SimTime> {
    let stamp: [u8; TIMESTAMP_LEN] = chunk.get(..TIMESTAMP_LEN)?.try_into().ok()?;
    Some(SimTime::from_nanos(u64::from_le_bytes(stamp)))
}
