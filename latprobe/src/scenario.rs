//! The reference two-node run: a [`PacedSender`] on one node, a
//! [`PacketSink`] feeding a [`LatencyRecorder`] on the other, and a
//! single link between them.

use crate::{
    recorder::LatencyRecorder,
    sender::{PacedSender, SenderError, SenderStats},
};
use anyhow::{Context as _, Result};
use latprobe_core::{
    app::{AppHandle, PacketSink, RxHandler},
    measure::{Bandwidth, Latency, PacketLoss},
    network::Network,
    node::{Address, NodeId},
    sim::{RunSummary, Simulation},
    time::SimTime,
    transport::{TransportConfig, TransportStats},
};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;

pub const DEFAULT_UNIT_SIZE: usize = 100;
pub const DEFAULT_RATE: f64 = 10.0;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_PORT: u16 = 50_000;
pub const DEFAULT_OUTPUT: &str = "latencies.txt";

/// Everything that can be tuned in a [`Scenario`].
///
/// The [`Default`] is the reference run: 100 units of 100 bytes, 10 per
/// second, over a `1gbps` link with `30us` of latency.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    /// bytes per unit, timestamp included
    pub unit_size: usize,
    /// units per simulated second
    pub rate: f64,
    /// how long the sender sends for, this sets the budget
    pub duration: Duration,
    pub sender_start: SimTime,
    pub sender_stop: SimTime,
    pub sink_start: SimTime,
    pub sink_stop: SimTime,
    /// port the sink listens on
    pub port: u16,
    /// have the sender connect to a port nobody listens on
    pub unreachable: bool,
    pub latency: Latency,
    pub bandwidth: Bandwidth,
    pub packet_loss: PacketLoss,
    /// seed of the packet loss draws
    pub seed: u64,
    /// `None` runs until no event is left
    pub stop_time: Option<SimTime>,
    /// where the binary exports the latencies
    pub output: PathBuf,
    pub transport: TransportConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            unit_size: DEFAULT_UNIT_SIZE,
            rate: DEFAULT_RATE,
            duration: DEFAULT_DURATION,
            sender_start: SimTime::from_secs(2),
            sender_stop: SimTime::from_secs(20),
            sink_start: SimTime::from_secs(1),
            sink_stop: SimTime::from_secs(12),
            port: DEFAULT_PORT,
            unreachable: false,
            latency: Latency::default(),
            bandwidth: Bandwidth::default(),
            packet_loss: PacketLoss::None,
            seed: 0,
            stop_time: Some(SimTime::from_secs(20)),
            output: PathBuf::from(DEFAULT_OUTPUT),
            transport: TransportConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// the port the sender connects to
    pub fn destination_port(&self) -> u16 {
        if self.unreachable {
            self.port.wrapping_add(1)
        } else {
            self.port
        }
    }

    /// # Errors
    ///
    /// [`SenderError::InvalidConfiguration`] if the sender cannot be
    /// configured or if a unit does not fit in a single segment.
    pub fn validate(&self) -> Result<(), SenderError> {
        if self.unit_size > self.transport.segment_size {
            return Err(SenderError::InvalidConfiguration(format!(
                "unit size of {} bytes exceeds the segment size of {} bytes",
                self.unit_size, self.transport.segment_size
            )));
        }
        PacedSender::configure(
            Address::new(NodeId::ONE, self.port),
            self.unit_size,
            self.rate,
            self.duration,
        )
        .map(drop)
    }
}

/// A ready to run simulation of the reference two-node path.
///
/// The handler `H` receives every chunk the sink accepts. It is a
/// [`LatencyRecorder`] unless built with [`Scenario::with_handler`].
pub struct Scenario<H = LatencyRecorder> {
    sim: Simulation,
    sender: AppHandle<PacedSender>,
    sink: AppHandle<PacketSink<H>>,
}

/// What a [`Scenario`] run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioReport {
    pub run: RunSummary,
    pub sender: SenderStats,
    /// chunks accepted by the sink
    pub chunks: u64,
    pub transport: TransportStats,
}

impl Scenario<LatencyRecorder> {
    pub fn build(config: &ScenarioConfig) -> Result<Self, SenderError> {
        Self::with_handler(config, LatencyRecorder::new())
    }

    pub fn recorder(&self) -> Option<&LatencyRecorder> {
        self.handler()
    }

    pub fn recorder_mut(&mut self) -> Option<&mut LatencyRecorder> {
        self.handler_mut()
    }

    /// Write the recorded latencies to `path`, truncating it.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let recorder = self
            .recorder()
            .context("the latency recorder is not installed")?;

        recorder
            .export_to_path(path)
            .with_context(|| format!("cannot write latencies to {}", path.display()))?;
        info!(samples = recorder.len(), path = %path.display(), "latencies exported");
        Ok(())
    }
}

impl<H> Scenario<H>
where
    H: RxHandler + 'static,
{
    /// # Errors
    ///
    /// See [`ScenarioConfig::validate`].
    pub fn with_handler(config: &ScenarioConfig, handler: H) -> Result<Self, SenderError> {
        config.validate()?;

        let mut network = Network::new();
        let client = network.new_node();
        let server = network.new_node();
        network
            .configure_link(client, server)
            .set_latency(config.latency)
            .set_bandwidth(config.bandwidth)
            .set_packet_loss(config.packet_loss)
            .apply();
        network.set_seed(config.seed);

        let mut sim = Simulation::new(network, config.transport.clone());
        if let Some(stop) = config.stop_time {
            sim.stop_at(stop);
        }

        let sink = sim
            .install(server, PacketSink::new(config.port, handler))
            .start_at(config.sink_start)
            .stop_at(config.sink_stop)
            .build();

        let sender = PacedSender::configure(
            Address::new(server, config.destination_port()),
            config.unit_size,
            config.rate,
            config.duration,
        )?;
        let sender = sim
            .install(client, sender)
            .start_at(config.sender_start)
            .stop_at(config.sender_stop)
            .build();

        info!(
            unit_size = config.unit_size,
            rate = config.rate,
            duration = ?config.duration,
            latency = %config.latency,
            bandwidth = %config.bandwidth,
            packet_loss = %config.packet_loss,
            seed = config.seed,
            "scenario ready"
        );

        Ok(Self { sim, sender, sink })
    }

    pub fn run(&mut self) -> ScenarioReport {
        let run = self.sim.run();

        ScenarioReport {
            run,
            sender: self.sender().map(PacedSender::stats).unwrap_or_default(),
            chunks: self.sink().map(PacketSink::chunks).unwrap_or_default(),
            transport: self.sim.transport_stats(),
        }
    }

    pub fn sender(&self) -> Option<&PacedSender> {
        self.sim.app(&self.sender)
    }

    pub fn sink(&self) -> Option<&PacketSink<H>> {
        self.sim.app(&self.sink)
    }

    pub fn handler(&self) -> Option<&H> {
        self.sink().map(PacketSink::handler)
    }

    pub fn handler_mut(&mut self) -> Option<&mut H> {
        self.sim.app_mut(&self.sink).map(PacketSink::handler_mut)
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "halted at {} after {} events: {} units sent, {} received, {} retransmissions",
            self.run.finished_at,
            self.run.events,
            self.sender.units_sent,
            self.chunks,
            self.transport.retransmissions
        )
    }
}
