use crate::{
    link::{Link, LinkDirection, LinkId},
    measure::{Bandwidth, Latency, PacketLoss},
    node::{Node, NodeId},
    stats::{LinkStats, NetworkStats, NodeStats},
    time::SimTime,
};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::collections::BTreeMap;
use thiserror::Error;

/// The topology the transport runs on: nodes and the links between
/// them.
///
/// The [`Network`] does not know anything about connections. It only
/// answers one question: if `bytes` are handed to the link between two
/// nodes at a given time, when do they start going out, when do they
/// reach the other end, and are they lost on the way.
///
/// # Example
///
/// ```
/// use latprobe_core::{network::Network, time::SimTime};
/// # use std::time::Duration;
///
/// let mut network = Network::new();
/// let n1 = network.new_node();
/// let n2 = network.new_node();
/// network
///     .configure_link(n1, n2)
///     .set_latency("30us".parse().unwrap())
///     .set_bandwidth("1gbps".parse().unwrap())
///     .apply();
///
/// let transmission = network.transmit(n1, n2, 142, SimTime::ZERO).unwrap();
/// assert_eq!(
///     transmission.arrival,
///     SimTime::from_nanos(1_136 + 30_000),
/// );
/// assert!(!transmission.lost);
/// ```
pub struct Network {
    nodes: BTreeMap<NodeId, Node>,

    links: BTreeMap<LinkId, Link>,

    /// the last assigned ID
    ///
    /// ID 0 is never given to a node
    id: NodeId,

    /// Centralised RNG for all packet-loss decisions on every link.
    rng: ChaChaRng,
}

/// Builder for configuring a link between two nodes.
///
/// Obtained via [`Network::configure_link`]. Call [`LinkBuilder::apply`] to
/// commit the configuration.
pub struct LinkBuilder<'a> {
    a: NodeId,
    b: NodeId,
    latency: Latency,
    bandwidth: Bandwidth,
    packet_loss: PacketLoss,
    network: &'a mut Network,
}

/// Outcome of a single transmission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    /// the sender's transmitter starts serialising the bytes
    pub departure: SimTime,
    /// the bytes are fully received at the far end
    ///
    /// Meaningless if the attempt is `lost`.
    pub arrival: SimTime,
    /// the link dropped this attempt
    pub lost: bool,
}

/// Error returned when a route between two nodes cannot be used.
///
/// Nodes are not automatically connected when created: a link must be
/// explicitly configured via [`Network::configure_link`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("Sender ({sender}) Not Found")]
    SenderNotFound { sender: NodeId },
    #[error("Recipient ({recipient}) Not Found")]
    RecipientNotFound { recipient: NodeId },
    #[error("Link ({link}) Not Found: nodes are not directly connected, call configure_link first")]
    LinkNotFound { link: LinkId },
    /// the link is configured with a bandwidth of `0bps`
    #[error("Link ({link}) cannot carry any data")]
    NoCapacity { link: LinkId },
}

impl LinkBuilder<'_> {
    /// Set the one-way latency of this link.
    pub fn set_latency(mut self, latency: Latency) -> Self {
        self.latency = latency;
        self
    }

    /// Set the bandwidth of this link.
    ///
    /// The same bandwidth applies to both directions independently.
    pub fn set_bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Set the probabilistic packet loss rate of this link.
    pub fn set_packet_loss(mut self, packet_loss: PacketLoss) -> Self {
        self.packet_loss = packet_loss;
        self
    }

    /// Commit the link configuration to the network.
    pub fn apply(self) {
        let Self {
            a,
            b,
            latency,
            bandwidth,
            packet_loss,
            network,
        } = self;
        let id = LinkId::new((a, b));
        network
            .links
            .insert(id, Link::new(latency, bandwidth, packet_loss));
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            links: BTreeMap::new(),
            id: NodeId::ZERO,
            rng: ChaChaRng::seed_from_u64(0),
        }
    }

    /// Re-seed the network's random-number generator.
    ///
    /// All packet-loss decisions for every link are drawn from this
    /// single [`ChaChaRng`]. Two runs with the same seed and the same
    /// traffic drop exactly the same attempts.
    ///
    /// The default seed is `0`.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaChaRng::seed_from_u64(seed);
    }

    /// Add a node to the network.
    ///
    /// Node IDs are assigned sequentially starting at `1`.
    pub fn new_node(&mut self) -> NodeId {
        self.id = self.id.next();
        self.nodes.insert(self.id, Node::new(self.id));
        self.id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn link(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        self.links.get(&LinkId::new((a, b)))
    }

    /// Configure the link between two nodes.
    ///
    /// If a link already exists between these nodes it is replaced.
    ///
    /// ```
    /// # use latprobe_core::{network::Network, measure::Latency};
    /// # use std::time::Duration;
    /// let mut network = Network::new();
    /// let n1 = network.new_node();
    /// let n2 = network.new_node();
    ///
    /// network
    ///     .configure_link(n1, n2)
    ///     .set_latency(Latency::new(Duration::from_millis(10)))
    ///     .set_bandwidth("100mbps".parse().unwrap())
    ///     .apply();
    /// ```
    pub fn configure_link(&mut self, a: NodeId, b: NodeId) -> LinkBuilder<'_> {
        LinkBuilder {
            a,
            b,
            latency: Latency::default(),
            bandwidth: Bandwidth::default(),
            packet_loss: PacketLoss::default(),
            network: self,
        }
    }

    /// Check that `bytes` could be transmitted from `from` to `to`
    /// without touching any link state.
    ///
    /// # Errors
    ///
    /// - [`RouteError::SenderNotFound`] or [`RouteError::RecipientNotFound`]
    ///   if either node does not exist.
    /// - [`RouteError::LinkNotFound`] if no link has been configured.
    pub fn route(&self, from: NodeId, to: NodeId) -> Result<LinkId, RouteError> {
        if !self.nodes.contains_key(&from) {
            return Err(RouteError::SenderNotFound { sender: from });
        }
        if !self.nodes.contains_key(&to) {
            return Err(RouteError::RecipientNotFound { recipient: to });
        }
        let edge = LinkId::new((from, to));
        if !self.links.contains_key(&edge) {
            return Err(RouteError::LinkNotFound { link: edge });
        }
        Ok(edge)
    }

    /// Hand `bytes` to the link from `from` to `to` at `now`.
    ///
    /// The attempt occupies the transmitter whether or not it is lost.
    /// The loss decision is drawn from the network's RNG.
    ///
    /// # Errors
    ///
    /// See [`Network::route`], plus [`RouteError::NoCapacity`] if the link
    /// bandwidth is `0bps`. Nothing is recorded on error.
    pub fn transmit(
        &mut self,
        from: NodeId,
        to: NodeId,
        bytes: u64,
        now: SimTime,
    ) -> Result<Transmission, RouteError> {
        let edge = self.route(from, to)?;
        let direction = if from < to {
            LinkDirection::Forward
        } else {
            LinkDirection::Reverse
        };

        let Some(link) = self.links.get_mut(&edge) else {
            return Err(RouteError::LinkNotFound { link: edge });
        };
        let Some(slot) = link.reserve(direction, bytes, now) else {
            return Err(RouteError::NoCapacity { link: edge });
        };
        let lost = link.should_drop_packet(&mut self.rng);

        if let Some(node) = self.nodes.get_mut(&from) {
            node.record_transmission(bytes, lost);
        }

        Ok(Transmission {
            departure: slot.departure,
            arrival: slot.arrival,
            lost,
        })
    }

    /// Point-in-time snapshot of every node and link.
    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            nodes: self
                .nodes
                .values()
                .map(|node| NodeStats {
                    id: node.id(),
                    segments_sent: node.segments_sent(),
                    bytes_sent: node.bytes_sent(),
                    segments_lost: node.segments_lost(),
                })
                .collect(),
            links: self
                .links
                .iter()
                .map(|(id, link)| LinkStats {
                    id: *id,
                    latency: link.latency(),
                    bandwidth: link.bandwidth(),
                    packet_loss: link.packet_loss(),
                })
                .collect(),
        }
    }
}
