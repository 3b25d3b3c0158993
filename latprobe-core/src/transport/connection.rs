use crate::{app::AppId, node::Address, time::SimTime};
use std::fmt;

/// Handle on one end of a connection, as returned by
/// [`Transport::create_endpoint`].
///
/// [`Transport::create_endpoint`]: crate::transport::Transport::create_endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use = "function does not modify the current value"]
    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Life cycle of a connection endpoint.
///
/// ```text
/// Open -> SynSent -> Established -> Aborted
///            |
///            +----> Failed
/// ```
///
/// Closing moves any state to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// created, not connected yet
    Open,
    /// handshake in progress
    SynSent,
    Established,
    /// the application closed the endpoint
    Closed,
    /// the handshake failed
    Failed,
    /// a segment could not be delivered after all its retransmissions
    Aborted,
}

#[derive(Debug)]
pub(crate) struct Connection {
    pub(crate) owner: AppId,
    pub(crate) local: Address,
    pub(crate) remote: Option<Address>,
    pub(crate) state: ConnectionState,
    /// delivery time of the latest segment sent on this connection
    pub(crate) last_delivery: SimTime,
    /// transport events scheduled for this connection and not handled yet
    pub(crate) pending_events: u32,
}

impl Connection {
    pub(crate) fn new(owner: AppId, local: Address) -> Self {
        Self {
            owner,
            local,
            remote: None,
            state: ConnectionState::Open,
            last_delivery: SimTime::ZERO,
            pending_events: 0,
        }
    }
}
