mod id;

pub use self::id::NodeId;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// A transport endpoint address: a node and a port on that node.
///
/// ```
/// # use latprobe_core::node::{Address, NodeId};
/// let address: Address = "1:50000".parse().unwrap();
/// assert_eq!(address.node(), NodeId::ONE);
/// assert_eq!(address.port(), 50_000);
/// assert_eq!(address.to_string(), "1:50000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    node: NodeId,
    port: u16,
}

#[derive(Debug, Error)]
pub enum AddressParseError {
    #[error("Expecting `<node>:<port>', cannot parse `{0}'")]
    MissingSeparator(String),
    #[error("Invalid node identifier in `{0}'")]
    InvalidNode(String),
    #[error("Invalid port in `{0}'")]
    InvalidPort(String),
}

impl Address {
    pub const fn new(node: NodeId, port: u16) -> Self {
        Self { node, port }
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((node, port)) = s.split_once(':') else {
            return Err(AddressParseError::MissingSeparator(s.to_owned()));
        };
        let node = node
            .parse()
            .map_err(|_| AddressParseError::InvalidNode(s.to_owned()))?;
        let port = port
            .parse()
            .map_err(|_| AddressParseError::InvalidPort(s.to_owned()))?;

        Ok(Self::new(node, port))
    }
}

/// A host of the simulated [`Network`].
///
/// Nodes have no configuration of their own, they only keep track of
/// what they have put on the wire.
///
/// [`Network`]: crate::network::Network
#[derive(Debug)]
pub struct Node {
    id: NodeId,

    segments_sent: u64,
    bytes_sent: u64,
    segments_lost: u64,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            segments_sent: 0,
            bytes_sent: 0,
            segments_lost: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Number of transmission attempts started by this node, lost ones
    /// included.
    pub fn segments_sent(&self) -> u64 {
        self.segments_sent
    }

    /// Bytes put on the wire by this node, header overhead included.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Number of transmission attempts the link dropped.
    pub fn segments_lost(&self) -> u64 {
        self.segments_lost
    }

    pub(crate) fn record_transmission(&mut self, bytes: u64, lost: bool) {
        self.segments_sent += 1;
        self.bytes_sent = self.bytes_sent.saturating_add(bytes);
        if lost {
            self.segments_lost += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_address_errors() {
        assert!(matches!(
            "1".parse::<Address>(),
            Err(AddressParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            "a:1".parse::<Address>(),
            Err(AddressParseError::InvalidNode(_))
        ));
        assert!(matches!(
            "1:70000".parse::<Address>(),
            Err(AddressParseError::InvalidPort(_))
        ));
    }

    #[test]
    fn node_accounting() {
        let mut node = Node::new(NodeId::ONE);
        node.record_transmission(142, false);
        node.record_transmission(142, true);

        assert_eq!(node.segments_sent(), 2);
        assert_eq!(node.bytes_sent(), 284);
        assert_eq!(node.segments_lost(), 1);
    }
}
