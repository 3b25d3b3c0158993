//! Applications are what drive the simulation.
//!
//! An [`Application`] is installed on a node of the [`Simulation`] with a
//! start and (optionally) a stop time. Everything it does afterward is a
//! reaction to an event: its activation, one of its timers firing, or a
//! notification from the transport. It acts on the simulation through
//! the [`Context`] it is handed with each event.
//!
//! [`Simulation`]: crate::sim::Simulation

mod sink;

pub use self::sink::{PacketSink, RxHandler};
use crate::{
    network::Network,
    node::{Address, NodeId},
    scheduler::Scheduler,
    sim::Event,
    time::SimTime,
    transport::{ConnectError, ConnectionId, ConnectionState, Transport, TransportError},
};
use std::{any::Any, fmt, marker::PhantomData, time::Duration};

/// Identifier of an application installed in a [`Simulation`].
///
/// [`Simulation`]: crate::sim::Simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppId(usize);

impl AppId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app#{}", self.0)
    }
}

/// Typed handle on an installed application.
///
/// Use it with [`Simulation::app`] to look at the application once the
/// run is over.
///
/// [`Simulation::app`]: crate::sim::Simulation::app
pub struct AppHandle<A> {
    id: AppId,
    _app: PhantomData<fn() -> A>,
}

impl<A> AppHandle<A> {
    pub(crate) fn new(id: AppId) -> Self {
        Self {
            id,
            _app: PhantomData,
        }
    }

    pub fn id(&self) -> AppId {
        self.id
    }
}

impl<A> Clone for AppHandle<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for AppHandle<A> {}

impl<A> fmt::Debug for AppHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AppHandle").field(&self.id).finish()
    }
}

/// Opaque value an application attaches to its timers to tell them
/// apart when they fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

/// The behaviour of a simulated program.
///
/// `start` and `stop` are each called at most once, at the times given
/// when installing the application. The notifications only have to be
/// implemented by applications that use the matching feature.
pub trait Application: Any {
    fn start(&mut self, ctx: &mut Context<'_>);

    fn stop(&mut self, ctx: &mut Context<'_>);

    /// a timer set with [`Context::schedule_in`] fired
    fn on_timer(&mut self, ctx: &mut Context<'_>, token: TimerToken) {
        let _ = (ctx, token);
    }

    /// the handshake of `conn` completed
    fn on_connect_succeeded(&mut self, ctx: &mut Context<'_>, conn: ConnectionId) {
        let _ = (ctx, conn);
    }

    fn on_connect_failed(
        &mut self,
        ctx: &mut Context<'_>,
        conn: ConnectionId,
        error: ConnectError,
    ) {
        let _ = (ctx, conn, error);
    }

    /// a segment arrived on an address this application listens on
    fn on_delivered(
        &mut self,
        ctx: &mut Context<'_>,
        conn: ConnectionId,
        payload: &[u8],
        from: Address,
    ) {
        let _ = (ctx, conn, payload, from);
    }
}

/// What an [`Application`] can do while handling an event.
pub struct Context<'a> {
    pub(crate) app: AppId,
    pub(crate) node: NodeId,
    pub(crate) scheduler: &'a mut Scheduler<Event>,
    pub(crate) network: &'a mut Network,
    pub(crate) transport: &'a mut Transport,
}

impl Context<'_> {
    #[inline]
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// the node the application is installed on
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn app_id(&self) -> AppId {
        self.app
    }

    /// Fire [`Application::on_timer`] with `token` after `delay`.
    ///
    /// Timers cannot be cancelled.
    pub fn schedule_in(&mut self, delay: Duration, token: TimerToken) {
        self.schedule_at(self.now() + delay, token)
    }

    pub fn schedule_at(&mut self, time: SimTime, token: TimerToken) {
        let app = self.app;
        self.scheduler.schedule_at(time, Event::Timer { app, token });
    }

    /// Create a connection endpoint on this application's node.
    pub fn create_endpoint(&mut self) -> Result<ConnectionId, TransportError> {
        self.transport
            .create_endpoint(self.network, self.node, self.app)
    }

    /// Start connecting `conn` to `destination`.
    ///
    /// The result comes later, through either
    /// [`Application::on_connect_succeeded`] or
    /// [`Application::on_connect_failed`].
    pub fn connect(
        &mut self,
        conn: ConnectionId,
        destination: Address,
    ) -> Result<(), TransportError> {
        let now = self.now();
        let (at, event) = self
            .transport
            .connect(self.network, conn, destination, now)?;
        self.scheduler.schedule_at(at, Event::Transport(event));
        Ok(())
    }

    /// Send `payload` as a single segment on the established `conn`.
    pub fn send(&mut self, conn: ConnectionId, payload: Vec<u8>) -> Result<(), TransportError> {
        let now = self.now();
        if let Some((at, event)) = self.transport.send(self.network, conn, payload, now)? {
            self.scheduler.schedule_at(at, Event::Transport(event));
        }
        Ok(())
    }

    pub fn close(&mut self, conn: ConnectionId) -> Result<(), TransportError> {
        self.transport.close(conn)
    }

    pub fn connection_state(&self, conn: ConnectionId) -> Option<ConnectionState> {
        self.transport.state(conn)
    }

    /// Receive the segments sent to `port` on this application's node.
    pub fn listen(&mut self, port: u16) -> Result<Address, TransportError> {
        let address = Address::new(self.node, port);
        self.transport.listen(self.network, address, self.app)?;
        Ok(address)
    }

    pub fn unlisten(&mut self, port: u16) -> bool {
        self.transport.unlisten(Address::new(self.node, port))
    }
}
