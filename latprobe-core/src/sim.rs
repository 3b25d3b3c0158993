use crate::{
    app::{AppHandle, AppId, Application, Context, TimerToken},
    network::Network,
    node::NodeId,
    scheduler::Scheduler,
    time::SimTime,
    transport::{Transport, TransportConfig, TransportEvent, TransportStats, Upcall},
};
use std::any::Any;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(crate) enum Event {
    Start(AppId),
    Stop(AppId),
    Timer { app: AppId, token: TimerToken },
    Transport(TransportEvent),
}

struct Installed {
    node: NodeId,
    app: Box<dyn Application>,
    started: bool,
    stopped: bool,
}

/// A discrete-event simulation of applications talking over a
/// [`Network`].
///
/// The simulation owns everything: the clock and its events, the
/// network, the transport and the installed applications. It executes
/// one event at a time, in time order, until nothing is left to do or
/// the stop time is reached.
///
/// ```
/// use latprobe_core::{
///     app::PacketSink, network::Network, node::Address, sim::Simulation,
///     time::SimTime, transport::TransportConfig,
/// };
///
/// let mut network = Network::new();
/// let n1 = network.new_node();
/// let n2 = network.new_node();
/// network.configure_link(n1, n2).apply();
///
/// let mut sim = Simulation::new(network, TransportConfig::default());
/// let sink = sim
///     .install(n2, PacketSink::new(9, |_: &[u8], _: Address, _: SimTime| ()))
///     .start_at(SimTime::from_secs(1))
///     .stop_at(SimTime::from_secs(2))
///     .build();
///
/// let summary = sim.run();
/// assert_eq!(summary.finished_at, SimTime::from_secs(2));
/// assert!(!sim.app(&sink).unwrap().is_listening());
/// ```
pub struct Simulation {
    scheduler: Scheduler<Event>,
    network: Network,
    transport: Transport,
    apps: Vec<Installed>,

    events: u64,
}

/// Builder returned by [`Simulation::install`].
///
/// The application starts at [`SimTime::ZERO`] and is never stopped
/// unless configured otherwise.
pub struct InstallBuilder<'a, A> {
    sim: &'a mut Simulation,
    node: NodeId,
    app: A,
    start: SimTime,
    stop: Option<SimTime>,
}

/// What a call to [`Simulation::run`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// events executed, over the whole life of the simulation
    pub events: u64,
    /// the virtual time when the run returned
    pub finished_at: SimTime,
    /// events left unexecuted because they are due after the stop time
    pub pending: usize,
}

impl<A> InstallBuilder<'_, A>
where
    A: Application,
{
    pub fn start_at(mut self, time: SimTime) -> Self {
        self.start = time;
        self
    }

    pub fn stop_at(mut self, time: SimTime) -> Self {
        self.stop = Some(time);
        self
    }

    pub fn build(self) -> AppHandle<A> {
        let Self {
            sim,
            node,
            app,
            start,
            stop,
        } = self;

        let id = AppId::new(sim.apps.len());
        sim.apps.push(Installed {
            node,
            app: Box::new(app),
            started: false,
            stopped: false,
        });
        sim.scheduler.schedule_at(start, Event::Start(id));
        if let Some(stop) = stop {
            sim.scheduler.schedule_at(stop, Event::Stop(id));
        }

        debug!(app = %id, %node, %start, "application installed");
        AppHandle::new(id)
    }
}

impl Simulation {
    pub fn new(network: Network, config: TransportConfig) -> Self {
        Self {
            scheduler: Scheduler::new(),
            network,
            transport: Transport::new(config),
            apps: Vec::new(),
            events: 0,
        }
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn transport_stats(&self) -> TransportStats {
        self.transport.stats()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Events due after `time` are not executed.
    pub fn stop_at(&mut self, time: SimTime) {
        self.scheduler.stop_at(time);
    }

    pub fn install<A>(&mut self, node: NodeId, app: A) -> InstallBuilder<'_, A>
    where
        A: Application,
    {
        InstallBuilder {
            sim: self,
            node,
            app,
            start: SimTime::ZERO,
            stop: None,
        }
    }

    pub fn app<A>(&self, handle: &AppHandle<A>) -> Option<&A>
    where
        A: Application,
    {
        let installed = self.apps.get(handle.id().index())?;
        let app: &dyn Any = &*installed.app;
        app.downcast_ref()
    }

    pub fn app_mut<A>(&mut self, handle: &AppHandle<A>) -> Option<&mut A>
    where
        A: Application,
    {
        let installed = self.apps.get_mut(handle.id().index())?;
        let app: &mut dyn Any = &mut *installed.app;
        app.downcast_mut()
    }

    /// Execute events until none is left or the stop time is reached.
    pub fn run(&mut self) -> RunSummary {
        info!(apps = self.apps.len(), stop = ?self.scheduler.stop_time(), "simulation running");

        while self.step() {}

        let summary = RunSummary {
            events: self.events,
            finished_at: self.now(),
            pending: self.scheduler.len(),
        };
        info!(
            events = summary.events,
            finished_at = %summary.finished_at,
            pending = summary.pending,
            "simulation halted"
        );
        summary
    }

    /// Execute the next event, returns `false` if there was none to run.
    pub fn step(&mut self) -> bool {
        let Some((now, event)) = self.scheduler.pop() else {
            return false;
        };
        self.events += 1;

        match event {
            Event::Start(id) => self.activate(id, true),
            Event::Stop(id) => self.activate(id, false),
            Event::Timer { app, token } => {
                self.dispatch(app, |app, ctx| app.on_timer(ctx, token));
            }
            Event::Transport(event) => {
                let outcome = self.transport.handle(&mut self.network, event, now);

                if let Some((at, event)) = outcome.follow_up {
                    self.scheduler.schedule_at(at, Event::Transport(event));
                }
                if let Some((id, upcall)) = outcome.upcall {
                    self.upcall(id, upcall);
                }
            }
        }

        true
    }

    fn activate(&mut self, id: AppId, start: bool) {
        let Some(installed) = self.apps.get_mut(id.index()) else {
            return;
        };

        if start {
            if installed.started || installed.stopped {
                warn!(app = %id, "application already started or stopped, not starting it");
                return;
            }
            installed.started = true;
            info!(app = %id, node = %installed.node, "starting application");
            self.dispatch(id, |app, ctx| app.start(ctx));
        } else {
            if installed.stopped {
                return;
            }
            installed.stopped = true;
            info!(app = %id, node = %installed.node, "stopping application");
            self.dispatch(id, |app, ctx| app.stop(ctx));
        }
    }

    fn upcall(&mut self, id: AppId, upcall: Upcall) {
        match upcall {
            Upcall::Connected { conn } => {
                self.dispatch(id, |app, ctx| app.on_connect_succeeded(ctx, conn))
            }
            Upcall::ConnectFailed { conn, error } => {
                self.dispatch(id, |app, ctx| app.on_connect_failed(ctx, conn, error))
            }
            Upcall::Delivered {
                conn,
                payload,
                from,
            } => self.dispatch(id, |app, ctx| app.on_delivered(ctx, conn, &payload, from)),
        }
    }

    fn dispatch<F>(&mut self, id: AppId, f: F)
    where
        F: FnOnce(&mut dyn Application, &mut Context<'_>),
    {
        let Self {
            scheduler,
            network,
            transport,
            apps,
            ..
        } = self;
        let Some(installed) = apps.get_mut(id.index()) else {
            return;
        };

        let mut ctx = Context {
            app: id,
            node: installed.node,
            scheduler,
            network,
            transport,
        };
        f(&mut *installed.app, &mut ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::{PacketSink, RxHandler},
        node::Address,
        transport::{ConnectError, ConnectionId},
    };
    use std::time::Duration;

    #[derive(Default)]
    struct Chunks(Vec<Vec<u8>>);

    impl RxHandler for Chunks {
        fn on_delivered(&mut self, chunk: &[u8], _: Address, _: SimTime) {
            self.0.push(chunk.to_vec());
        }
    }

    /// keeps a journal of everything that happens to it
    #[derive(Default)]
    struct Journal {
        destination: Option<Address>,
        entries: Vec<(SimTime, String)>,
    }

    impl Journal {
        fn log(&mut self, ctx: &Context<'_>, entry: impl Into<String>) {
            self.entries.push((ctx.now(), entry.into()));
        }

        fn entries(&self) -> Vec<&str> {
            self.entries.iter().map(|(_, e)| e.as_str()).collect()
        }
    }

    impl Application for Journal {
        fn start(&mut self, ctx: &mut Context<'_>) {
            self.log(ctx, "start");
            ctx.schedule_in(Duration::from_millis(10), TimerToken::new(2));
            ctx.schedule_in(Duration::from_millis(5), TimerToken::new(1));

            if let Some(destination) = self.destination {
                let conn = ctx.create_endpoint().unwrap();
                ctx.connect(conn, destination).unwrap();
            }
        }

        fn stop(&mut self, ctx: &mut Context<'_>) {
            self.log(ctx, "stop");
        }

        fn on_timer(&mut self, ctx: &mut Context<'_>, token: TimerToken) {
            self.log(ctx, format!("timer {}", token.value()));
        }

        fn on_connect_succeeded(&mut self, ctx: &mut Context<'_>, conn: ConnectionId) {
            self.log(ctx, "connected");
            ctx.send(conn, b"hello".to_vec()).unwrap();
        }

        fn on_connect_failed(
            &mut self,
            ctx: &mut Context<'_>,
            _: ConnectionId,
            error: ConnectError,
        ) {
            self.log(ctx, format!("failed: {error}"));
        }
    }

    fn two_nodes() -> (Network, NodeId, NodeId) {
        let mut network = Network::new();
        let n1 = network.new_node();
        let n2 = network.new_node();
        network.configure_link(n1, n2).apply();
        (network, n1, n2)
    }

    #[test]
    fn lifecycle_and_timers() {
        let (network, n1, _) = two_nodes();
        let mut sim = Simulation::new(network, TransportConfig::default());
        let journal = sim
            .install(n1, Journal::default())
            .start_at(SimTime::from_secs(1))
            .stop_at(SimTime::from_secs(2))
            .build();

        let summary = sim.run();

        let journal = sim.app(&journal).unwrap();
        assert_eq!(journal.entries(), vec!["start", "timer 1", "timer 2", "stop"]);
        assert_eq!(journal.entries[1].0, SimTime::from_nanos(1_005_000_000));
        assert_eq!(summary.events, 4);
        assert_eq!(summary.pending, 0);
    }

    #[test]
    fn stop_time_halts_the_run() {
        let (network, n1, _) = two_nodes();
        let mut sim = Simulation::new(network, TransportConfig::default());
        let journal = sim
            .install(n1, Journal::default())
            .start_at(SimTime::from_secs(1))
            .stop_at(SimTime::from_secs(2))
            .build();
        sim.stop_at(SimTime::from_nanos(1_007_000_000));

        let summary = sim.run();

        assert_eq!(sim.app(&journal).unwrap().entries(), vec!["start", "timer 1"]);
        assert_eq!(summary.finished_at, SimTime::from_nanos(1_007_000_000));
        assert_eq!(summary.pending, 2);
    }

    #[test]
    fn stop_before_start_never_starts() {
        let (network, n1, _) = two_nodes();
        let mut sim = Simulation::new(network, TransportConfig::default());
        let journal = sim
            .install(n1, Journal::default())
            .start_at(SimTime::from_secs(2))
            .stop_at(SimTime::from_secs(1))
            .build();

        sim.run();

        assert_eq!(sim.app(&journal).unwrap().entries(), vec!["stop"]);
    }

    #[test]
    fn connect_and_deliver() {
        let (network, n1, n2) = two_nodes();
        let mut sim = Simulation::new(network, TransportConfig::default());

        let sink = sim
            .install(n2, PacketSink::new(80, Chunks::default()))
            .build();
        let journal = sim
            .install(
                n1,
                Journal {
                    destination: Some(Address::new(n2, 80)),
                    ..Journal::default()
                },
            )
            .start_at(SimTime::from_secs(1))
            .build();

        sim.run();

        assert_eq!(
            sim.app(&journal).unwrap().entries(),
            vec!["start", "connected", "timer 1", "timer 2"]
        );
        let sink = sim.app(&sink).unwrap();
        assert_eq!(sink.chunks(), 1);
        assert_eq!(sink.bytes(), 5);
        assert_eq!(sink.handler().0, vec![b"hello".to_vec()]);
        assert_eq!(sim.transport_stats().segments_delivered, 1);
    }

    #[test]
    fn connection_refused() {
        let (network, n1, n2) = two_nodes();
        let mut sim = Simulation::new(network, TransportConfig::default());
        let journal = sim
            .install(
                n1,
                Journal {
                    destination: Some(Address::new(n2, 80)),
                    ..Journal::default()
                },
            )
            .build();

        sim.run();

        assert_eq!(
            sim.app(&journal).unwrap().entries()[1],
            "failed: Connection refused"
        );
    }

    #[test]
    fn wrong_handle_type() {
        let (network, n1, _) = two_nodes();
        let mut sim = Simulation::new(network, TransportConfig::default());
        let journal = sim.install(n1, Journal::default()).build();

        let lie = AppHandle::<PacketSink<Chunks>>::new(journal.id());
        assert!(sim.app(&lie).is_none());
        assert!(sim.app_mut(&journal).is_some());
    }
}
