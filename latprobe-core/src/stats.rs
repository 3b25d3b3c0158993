//! Network statistics.
//!
//! [`NetworkStats`] provides a point-in-time snapshot of the network state.
//! Obtain one via [`Network::stats`](crate::network::Network::stats).

use crate::{
    link::LinkId,
    measure::{Bandwidth, Latency, PacketLoss},
    node::NodeId,
};

/// Snapshot of statistics for a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStats {
    /// The node's identifier.
    pub id: NodeId,
    /// Transmission attempts started by the node, retransmissions included.
    pub segments_sent: u64,
    /// Bytes put on the wire, header overhead included.
    pub bytes_sent: u64,
    /// Attempts dropped by the link.
    pub segments_lost: u64,
}

/// Snapshot of the configuration of a single link.
#[derive(Debug, Clone)]
pub struct LinkStats {
    pub id: LinkId,
    pub latency: Latency,
    /// Applies to both directions independently.
    pub bandwidth: Bandwidth,
    pub packet_loss: PacketLoss,
}

/// Point-in-time snapshot of the entire network state.
#[derive(Debug, Clone)]
pub struct NetworkStats {
    /// Per-node statistics, ordered by [`NodeId`].
    pub nodes: Vec<NodeStats>,
    /// Per-link statistics, ordered by [`LinkId`].
    pub links: Vec<LinkStats>,
}
