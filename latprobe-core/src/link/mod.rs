mod id;

use crate::{
    measure::{Bandwidth, Latency, PacketLoss},
    time::SimTime,
};
use rand_core::Rng;

pub use self::id::LinkId;

/// Which direction a segment is travelling across a link.
///
/// `LinkId` is symmetric so the direction is tracked separately.
/// `Forward` means `smaller_id → larger_id`, `Reverse` is the opposite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkDirection {
    Forward,
    Reverse,
}

/// Configuration and transmitter state of a connection between two
/// [`Node`]s.
///
/// Each direction has its own transmitter. A transmitter sends one
/// segment at a time: a segment that is handed over while the previous
/// one is still being serialised waits for it (FIFO). The time a
/// transmitter becomes free again is its busy horizon.
///
/// [`Node`]: crate::node::Node
#[derive(Debug)]
pub struct Link {
    latency: Latency,
    bandwidth: Bandwidth,
    packet_loss: PacketLoss,

    busy_forward: SimTime,
    busy_reverse: SimTime,
}

/// Timing of one transmission attempt over a [`Link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    /// the transmitter starts serialising the segment
    pub departure: SimTime,
    /// the last bit reaches the far end
    pub arrival: SimTime,
}

impl Default for Link {
    fn default() -> Self {
        Self::new(
            Latency::default(),
            Bandwidth::default(),
            PacketLoss::default(),
        )
    }
}

impl Link {
    pub fn new(latency: Latency, bandwidth: Bandwidth, packet_loss: PacketLoss) -> Self {
        Self {
            latency,
            bandwidth,
            packet_loss,
            busy_forward: SimTime::ZERO,
            busy_reverse: SimTime::ZERO,
        }
    }

    /// Returns `true` if this attempt should be dropped based on the
    /// link's packet loss model.
    ///
    /// The caller provides `rng` so that all simulation randomness is
    /// controlled from a single, seedable source in [`Network`].
    ///
    /// [`Network`]: crate::network::Network
    pub fn should_drop_packet<R: Rng>(&self, rng: &mut R) -> bool {
        self.packet_loss.should_drop(rng)
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    pub fn packet_loss(&self) -> PacketLoss {
        self.packet_loss
    }

    /// Reserve the transmitter of `direction` for `bytes` handed over
    /// at `now`.
    ///
    /// Returns `None` if the link cannot carry anything (`0bps`), in which
    /// case the busy horizon is left untouched.
    pub(crate) fn reserve(
        &mut self,
        direction: LinkDirection,
        bytes: u64,
        now: SimTime,
    ) -> Option<Slot> {
        let transmission_time = self.bandwidth.transmission_time(bytes)?;
        let busy = match direction {
            LinkDirection::Forward => &mut self.busy_forward,
            LinkDirection::Reverse => &mut self.busy_reverse,
        };

        let departure = std::cmp::max(now, *busy);
        let done = departure + transmission_time;
        *busy = done;

        Some(Slot {
            departure,
            arrival: done + self.latency.into_duration(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn link() -> Link {
        Link::new(
            Latency::new(Duration::from_micros(30)),
            Bandwidth::new(8_000_000), // 1 byte per µs
            PacketLoss::None,
        )
    }

    #[test]
    fn idle_link() {
        let mut link = link();
        let now = SimTime::from_secs(1);

        let slot = link.reserve(LinkDirection::Forward, 10, now).unwrap();
        assert_eq!(slot.departure, now);
        assert_eq!(slot.arrival, now + Duration::from_micros(40));
    }

    #[test]
    fn back_to_back_segments_queue() {
        let mut link = link();
        let now = SimTime::ZERO;

        let first = link.reserve(LinkDirection::Forward, 100, now).unwrap();
        let second = link.reserve(LinkDirection::Forward, 100, now).unwrap();

        assert_eq!(second.departure, now + Duration::from_micros(100));
        assert_eq!(
            second.arrival - first.arrival,
            Duration::from_micros(100)
        );
    }

    #[test]
    fn directions_are_independent() {
        let mut link = link();
        let now = SimTime::ZERO;

        link.reserve(LinkDirection::Forward, 1_000, now).unwrap();
        let reverse = link.reserve(LinkDirection::Reverse, 10, now).unwrap();

        assert_eq!(reverse.departure, now);
    }

    #[test]
    fn zero_bandwidth() {
        let mut link = Link::new(Latency::ZERO, Bandwidth::new(0), PacketLoss::None);
        assert!(link.reserve(LinkDirection::Forward, 1, SimTime::ZERO).is_none());
    }
}
