//! Connection-oriented, ordered and reliable transport.
//!
//! The model is deliberately coarse: a connection is opened with a
//! SYN / SYN-ACK exchange (or refused with a RST), every
//! [`send`](Transport::send) is one segment, and lost attempts are
//! recovered by retransmitting after a fixed timeout. There is no
//! congestion control and no flow control.

mod connection;
mod retry;

pub use self::connection::{ConnectionId, ConnectionState};
use self::{
    connection::Connection,
    retry::{Delivery, deliver},
};
use crate::{
    app::AppId,
    defaults::{
        DEFAULT_DATA_RETRIES, DEFAULT_HEADER_OVERHEAD, DEFAULT_RETRANSMISSION_TIMEOUT,
        DEFAULT_SEGMENT_SIZE, DEFAULT_SYN_RETRIES, EPHEMERAL_PORT_START,
    },
    network::{Network, RouteError},
    node::{Address, NodeId},
    time::SimTime,
};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Parameters of the [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// largest payload of a single segment, in bytes
    pub segment_size: usize,
    /// bytes added to every segment on the wire
    ///
    /// The default (42) is IPv4 (20) + TCP (20) + PPP (2). Handshake
    /// segments carry no payload and occupy exactly this many bytes.
    pub header_overhead: u64,
    /// fixed delay before a lost attempt is retransmitted
    pub retransmission_timeout: Duration,
    /// retransmissions of a lost SYN (or SYN-ACK) before giving up
    pub syn_retries: u32,
    /// retransmissions of a lost data segment before aborting the
    /// connection
    pub data_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            header_overhead: DEFAULT_HEADER_OVERHEAD,
            retransmission_timeout: DEFAULT_RETRANSMISSION_TIMEOUT,
            syn_retries: DEFAULT_SYN_RETRIES,
            data_retries: DEFAULT_DATA_RETRIES,
        }
    }
}

/// Why a connection attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// the destination node answered with a reset: nothing listens
    /// on that port
    #[error("Connection refused")]
    Refused,
    /// there is no route to the destination node
    #[error("Destination unreachable")]
    Unreachable,
    /// every SYN (or SYN-ACK) transmission was lost
    #[error("Connection timed out")]
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Unknown connection ({conn})")]
    UnknownConnection { conn: ConnectionId },
    #[error("Connection ({conn}) is closed")]
    Closed { conn: ConnectionId },
    #[error("Connection ({conn}) is not established")]
    NotConnected { conn: ConnectionId },
    #[error("Connection ({conn}) is already connecting or connected")]
    AlreadyConnected { conn: ConnectionId },
    #[error("Connection ({conn}) was aborted")]
    Aborted { conn: ConnectionId },
    #[error("Segment of {len} bytes exceeds the segment size ({max} bytes)")]
    SegmentTooLarge { len: usize, max: usize },
    #[error("Address ({address}) already in use")]
    AddressInUse { address: Address },
    #[error("Node ({node}) Not Found")]
    NodeNotFound { node: NodeId },
    #[error("{0}")]
    Route(#[from] RouteError),
}

/// Counters of the [`Transport`] activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub connections_established: u64,
    pub connections_failed: u64,
    pub connections_aborted: u64,
    /// data segments accepted by [`Transport::send`]
    pub segments_sent: u64,
    /// data segments handed to a listening application
    pub segments_delivered: u64,
    /// data segments that arrived when nobody listened any more
    pub segments_unclaimed: u64,
    /// lost attempts that were transmitted again, handshakes included
    pub retransmissions: u64,
}

/// Something the transport needs to happen at a later time.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    SynArrived {
        conn: ConnectionId,
    },
    HandshakeCompleted {
        conn: ConnectionId,
    },
    ConnectFailed {
        conn: ConnectionId,
        error: ConnectError,
    },
    DataArrived {
        conn: ConnectionId,
        payload: Vec<u8>,
    },
}

impl TransportEvent {
    fn connection(&self) -> ConnectionId {
        match self {
            Self::SynArrived { conn }
            | Self::HandshakeCompleted { conn }
            | Self::ConnectFailed { conn, .. }
            | Self::DataArrived { conn, .. } => *conn,
        }
    }
}

/// A notification for an application.
#[derive(Debug)]
pub(crate) enum Upcall {
    Connected {
        conn: ConnectionId,
    },
    ConnectFailed {
        conn: ConnectionId,
        error: ConnectError,
    },
    Delivered {
        conn: ConnectionId,
        payload: Vec<u8>,
        from: Address,
    },
}

/// What handling a [`TransportEvent`] produced.
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub(crate) follow_up: Option<(SimTime, TransportEvent)>,
    pub(crate) upcall: Option<(AppId, Upcall)>,
}

/// Every connection endpoint and listener of the simulation.
///
/// A closed endpoint is dropped as soon as none of its events is still
/// scheduled. Its [`ConnectionId`] keeps reporting
/// [`ConnectionState::Closed`] and is never handed out again.
pub struct Transport {
    config: TransportConfig,

    connections: HashMap<ConnectionId, Connection>,
    listeners: HashMap<Address, AppId>,

    next_connection: ConnectionId,
    next_port: u16,

    stats: TransportStats,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            connections: HashMap::new(),
            listeners: HashMap::new(),
            next_connection: ConnectionId::new(1),
            next_port: EPHEMERAL_PORT_START,
            stats: TransportStats::default(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    pub fn state(&self, conn: ConnectionId) -> Option<ConnectionState> {
        match self.connections.get(&conn) {
            Some(connection) => Some(connection.state),
            None => self.was_issued(conn).then_some(ConnectionState::Closed),
        }
    }

    /// `None` once the endpoint is closed and retired.
    pub fn local_address(&self, conn: ConnectionId) -> Option<Address> {
        self.connections.get(&conn).map(|c| c.local)
    }

    /// `None` before [`connect`](Self::connect) and once the endpoint is
    /// closed and retired.
    pub fn remote_address(&self, conn: ConnectionId) -> Option<Address> {
        self.connections.get(&conn).and_then(|c| c.remote)
    }

    /// endpoints currently tracked, retired ones excluded
    pub fn endpoints(&self) -> usize {
        self.connections.len()
    }

    fn was_issued(&self, conn: ConnectionId) -> bool {
        ConnectionId::new(1) <= conn && conn < self.next_connection
    }

    /// the error for an endpoint that is not tracked
    fn missing(&self, conn: ConnectionId) -> TransportError {
        if self.was_issued(conn) {
            TransportError::Closed { conn }
        } else {
            TransportError::UnknownConnection { conn }
        }
    }

    /// Drop `conn` if it is closed and nothing scheduled refers to it.
    fn retire_if_idle(&mut self, conn: ConnectionId) {
        let idle = self.connections.get(&conn).is_some_and(|connection| {
            connection.state == ConnectionState::Closed && connection.pending_events == 0
        });
        if idle {
            self.connections.remove(&conn);
            trace!(%conn, "endpoint retired");
        }
    }

    pub fn is_listening(&self, address: Address) -> bool {
        self.listeners.contains_key(&address)
    }

    fn ephemeral_port(&mut self) -> u16 {
        let port = self.next_port;
        self.next_port = port.checked_add(1).unwrap_or(EPHEMERAL_PORT_START);
        port
    }

    /// Create a connection endpoint on `node`, bound to an ephemeral
    /// port, on behalf of the application `owner`.
    pub(crate) fn create_endpoint(
        &mut self,
        network: &Network,
        node: NodeId,
        owner: AppId,
    ) -> Result<ConnectionId, TransportError> {
        if !network.contains_node(node) {
            return Err(TransportError::NodeNotFound { node });
        }

        let conn = self.next_connection;
        self.next_connection = conn.next();
        let local = Address::new(node, self.ephemeral_port());

        trace!(%conn, %local, "endpoint created");
        self.connections.insert(conn, Connection::new(owner, local));
        Ok(conn)
    }

    /// Start the handshake of `conn` with `destination`.
    ///
    /// The outcome is always reported later, as the returned event.
    /// A destination without a route fails at `now`.
    pub(crate) fn connect(
        &mut self,
        network: &mut Network,
        conn: ConnectionId,
        destination: Address,
        now: SimTime,
    ) -> Result<(SimTime, TransportEvent), TransportError> {
        let missing = self.missing(conn);
        let connection = self.connections.get_mut(&conn).ok_or(missing)?;

        match connection.state {
            ConnectionState::Open => (),
            ConnectionState::SynSent | ConnectionState::Established => {
                return Err(TransportError::AlreadyConnected { conn });
            }
            ConnectionState::Aborted => return Err(TransportError::Aborted { conn }),
            ConnectionState::Closed | ConnectionState::Failed => {
                return Err(TransportError::Closed { conn });
            }
        }

        connection.remote = Some(destination);
        connection.state = ConnectionState::SynSent;
        connection.pending_events += 1;
        let from = connection.local.node();
        debug!(%conn, %destination, "sending SYN");

        let syn = deliver(
            network,
            from,
            destination.node(),
            self.config.header_overhead,
            now,
            self.config.syn_retries,
            self.config.retransmission_timeout,
        );

        Ok(match syn {
            Err(error) => {
                debug!(%conn, %error, "no route to destination");
                (
                    now,
                    TransportEvent::ConnectFailed {
                        conn,
                        error: ConnectError::Unreachable,
                    },
                )
            }
            Ok(delivery) => {
                self.stats.retransmissions += u64::from(delivery.attempts() - 1);
                match delivery {
                    Delivery::Arrives { at, .. } => (at, TransportEvent::SynArrived { conn }),
                    Delivery::GaveUp { at, .. } => (
                        at,
                        TransportEvent::ConnectFailed {
                            conn,
                            error: ConnectError::TimedOut,
                        },
                    ),
                }
            }
        })
    }

    /// Send `payload` as one segment of the established connection `conn`.
    ///
    /// Returns when and how the segment reaches the other end. Segments
    /// are delivered in the order they are sent: a segment whose
    /// predecessor is still being retransmitted waits for it.
    ///
    /// A segment lost more than `data_retries` times aborts the
    /// connection and `None` is returned.
    pub(crate) fn send(
        &mut self,
        network: &mut Network,
        conn: ConnectionId,
        payload: Vec<u8>,
        now: SimTime,
    ) -> Result<Option<(SimTime, TransportEvent)>, TransportError> {
        let missing = self.missing(conn);
        let connection = self.connections.get_mut(&conn).ok_or(missing)?;

        let remote = match (connection.state, connection.remote) {
            (ConnectionState::Established, Some(remote)) => remote,
            (ConnectionState::Closed, _) => return Err(TransportError::Closed { conn }),
            (ConnectionState::Aborted, _) => return Err(TransportError::Aborted { conn }),
            _ => return Err(TransportError::NotConnected { conn }),
        };

        let max = self.config.segment_size;
        if payload.len() > max {
            return Err(TransportError::SegmentTooLarge {
                len: payload.len(),
                max,
            });
        }

        let bytes = payload.len() as u64 + self.config.header_overhead;
        let delivery = deliver(
            network,
            connection.local.node(),
            remote.node(),
            bytes,
            now,
            self.config.data_retries,
            self.config.retransmission_timeout,
        )?;
        self.stats.retransmissions += u64::from(delivery.attempts() - 1);

        match delivery {
            Delivery::Arrives { at, attempts } => {
                let at = std::cmp::max(at, connection.last_delivery);
                connection.last_delivery = at;
                connection.pending_events += 1;
                self.stats.segments_sent += 1;

                trace!(%conn, len = payload.len(), %at, attempts, "segment sent");
                Ok(Some((at, TransportEvent::DataArrived { conn, payload })))
            }
            Delivery::GaveUp { attempts, .. } => {
                connection.state = ConnectionState::Aborted;
                self.stats.connections_aborted += 1;

                warn!(%conn, attempts, "segment lost too many times, connection aborted");
                Ok(None)
            }
        }
    }

    /// Close `conn`. Closing an already closed endpoint does nothing.
    ///
    /// Segments already sent are still delivered.
    pub(crate) fn close(&mut self, conn: ConnectionId) -> Result<(), TransportError> {
        let Some(connection) = self.connections.get_mut(&conn) else {
            return match self.missing(conn) {
                TransportError::Closed { .. } => Ok(()),
                error => Err(error),
            };
        };

        if connection.state != ConnectionState::Closed {
            debug!(%conn, state = ?connection.state, "closing connection");
            connection.state = ConnectionState::Closed;
        }
        self.retire_if_idle(conn);
        Ok(())
    }

    /// Accept connections and data on `address` for the application `app`.
    pub(crate) fn listen(
        &mut self,
        network: &Network,
        address: Address,
        app: AppId,
    ) -> Result<(), TransportError> {
        if !network.contains_node(address.node()) {
            return Err(TransportError::NodeNotFound {
                node: address.node(),
            });
        }
        if self.listeners.contains_key(&address) {
            return Err(TransportError::AddressInUse { address });
        }

        debug!(%address, %app, "listening");
        self.listeners.insert(address, app);
        Ok(())
    }

    /// Stop listening on `address`, returns `false` if nothing listened.
    pub(crate) fn unlisten(&mut self, address: Address) -> bool {
        let removed = self.listeners.remove(&address).is_some();
        if removed {
            debug!(%address, "stopped listening");
        }
        removed
    }

    pub(crate) fn handle(
        &mut self,
        network: &mut Network,
        event: TransportEvent,
        now: SimTime,
    ) -> Outcome {
        let conn = event.connection();
        if let Some(connection) = self.connections.get_mut(&conn) {
            connection.pending_events = connection.pending_events.saturating_sub(1);
        }

        let outcome = self.process(network, event, now);

        if let Some((_, follow_up)) = &outcome.follow_up
            && let Some(connection) = self.connections.get_mut(&follow_up.connection())
        {
            connection.pending_events += 1;
        }
        self.retire_if_idle(conn);
        outcome
    }

    fn process(&mut self, network: &mut Network, event: TransportEvent, now: SimTime) -> Outcome {
        match event {
            TransportEvent::SynArrived { conn } => self.on_syn_arrived(network, conn, now),
            TransportEvent::HandshakeCompleted { conn } => {
                let Some(connection) = self.connections.get_mut(&conn) else {
                    return Outcome::default();
                };
                if connection.state != ConnectionState::SynSent {
                    trace!(%conn, state = ?connection.state, "late SYN-ACK ignored");
                    return Outcome::default();
                }
                connection.state = ConnectionState::Established;
                self.stats.connections_established += 1;
                debug!(%conn, "connection established");

                Outcome {
                    follow_up: None,
                    upcall: Some((connection.owner, Upcall::Connected { conn })),
                }
            }
            TransportEvent::ConnectFailed { conn, error } => {
                let Some(connection) = self.connections.get_mut(&conn) else {
                    return Outcome::default();
                };
                if connection.state != ConnectionState::SynSent {
                    return Outcome::default();
                }
                connection.state = ConnectionState::Failed;
                self.stats.connections_failed += 1;
                debug!(%conn, %error, "connection failed");

                Outcome {
                    follow_up: None,
                    upcall: Some((connection.owner, Upcall::ConnectFailed { conn, error })),
                }
            }
            TransportEvent::DataArrived { conn, payload } => {
                let Some(connection) = self.connections.get(&conn) else {
                    return Outcome::default();
                };
                let from = connection.local;
                let listener = connection
                    .remote
                    .and_then(|remote| self.listeners.get(&remote).copied());

                let Some(app) = listener else {
                    self.stats.segments_unclaimed += 1;
                    trace!(%conn, len = payload.len(), "nobody listens, segment discarded");
                    return Outcome::default();
                };
                self.stats.segments_delivered += 1;

                Outcome {
                    follow_up: None,
                    upcall: Some((
                        app,
                        Upcall::Delivered {
                            conn,
                            payload,
                            from,
                        },
                    )),
                }
            }
        }
    }

    /// The SYN reached the destination node: answer with a SYN-ACK if
    /// something listens on the port, with a RST otherwise.
    fn on_syn_arrived(
        &mut self,
        network: &mut Network,
        conn: ConnectionId,
        now: SimTime,
    ) -> Outcome {
        let Some(connection) = self.connections.get(&conn) else {
            return Outcome::default();
        };
        let (Some(remote), ConnectionState::SynSent) = (connection.remote, connection.state) else {
            trace!(%conn, "SYN arrived for a connection no longer connecting");
            return Outcome::default();
        };
        let local = connection.local;
        let accepted = self.listeners.contains_key(&remote);

        let reply = deliver(
            network,
            remote.node(),
            local.node(),
            self.config.header_overhead,
            now,
            self.config.syn_retries,
            self.config.retransmission_timeout,
        );

        let follow_up = match reply {
            Err(_) => (
                now,
                TransportEvent::ConnectFailed {
                    conn,
                    error: ConnectError::Unreachable,
                },
            ),
            Ok(delivery) => {
                self.stats.retransmissions += u64::from(delivery.attempts() - 1);
                match (delivery, accepted) {
                    (Delivery::Arrives { at, .. }, true) => {
                        (at, TransportEvent::HandshakeCompleted { conn })
                    }
                    (Delivery::Arrives { at, .. }, false) => {
                        debug!(%conn, %remote, "nothing listens, sending RST");
                        let error = ConnectError::Refused;
                        (at, TransportEvent::ConnectFailed { conn, error })
                    }
                    (Delivery::GaveUp { at, .. }, _) => {
                        let error = ConnectError::TimedOut;
                        (at, TransportEvent::ConnectFailed { conn, error })
                    }
                }
            }
        };

        Outcome {
            follow_up: Some(follow_up),
            upcall: None,
        }
    }
}
