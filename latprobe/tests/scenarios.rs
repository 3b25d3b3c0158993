use latprobe::{
    recorder::{LatencyRecorder, RecordError},
    scenario::{Scenario, ScenarioConfig},
    sender::{PacedSender, SenderState},
    unit::decode_timestamp,
};
use latprobe_core::{
    app::{Application, Context, PacketSink, RxHandler},
    measure::PacketLoss,
    network::Network,
    node::{Address, NodeId},
    sim::Simulation,
    time::SimTime,
    transport::{ConnectionId, TransportConfig},
};
use std::time::Duration;
use tracing_test::traced_test;

/// Keeps the send and the receive time of every delivered unit.
#[derive(Debug, Default)]
struct Timeline {
    units: Vec<(SimTime, SimTime)>,
}

impl RxHandler for Timeline {
    fn on_delivered(&mut self, chunk: &[u8], _: Address, now: SimTime) {
        let sent_at = decode_timestamp(chunk).expect("every unit is timestamped");
        self.units.push((sent_at, now));
    }
}

#[test]
fn reference_run() {
    let mut scenario = Scenario::build(&ScenarioConfig::default()).unwrap();
    let report = scenario.run();

    assert_eq!(report.sender.units_sent, 100);
    assert_eq!(report.sender.connection_failures, 0);
    assert_eq!(report.chunks, 100);
    assert_eq!(report.transport.connections_established, 1);
    assert_eq!(report.transport.retransmissions, 0);

    let recorder = scenario.recorder().unwrap();
    assert_eq!(recorder.len(), 100);
    assert!(
        recorder
            .samples()
            .iter()
            .all(|latency| (30e-6..=100e-6).contains(latency))
    );

    // 100 bytes + 42 bytes of headers at 1gbps, plus the 30us of the link
    let summary = recorder.summary().unwrap();
    assert_eq!(summary.min, 0.000031136);
    assert_eq!(summary.max, 0.000031136);

    assert_eq!(
        scenario.sender().unwrap().state(),
        SenderState::Closed,
        "the sender stops at 20s"
    );
}

#[test]
fn reference_run_pacing() {
    let mut scenario =
        Scenario::with_handler(&ScenarioConfig::default(), Timeline::default()).unwrap();
    scenario.run();

    let units = &scenario.handler().unwrap().units;
    assert_eq!(units.len(), 100);

    let (first, _) = units[0];
    assert!(first >= SimTime::from_secs(2));
    assert!(first - SimTime::from_secs(2) < Duration::from_millis(1));

    for pair in units.windows(2) {
        let ((previous, _), (next, _)) = (pair[0], pair[1]);
        assert_eq!(next - previous, Duration::from_millis(100));
    }

    let (last_sent, last_received) = units[99];
    assert_eq!(last_sent, first + Duration::from_millis(9_900));
    assert!(last_received < SimTime::from_secs(12));
}

#[test]
#[traced_test]
fn unreachable_destination() {
    let config = ScenarioConfig {
        unreachable: true,
        ..ScenarioConfig::default()
    };
    let mut scenario = Scenario::build(&config).unwrap();
    let report = scenario.run();

    assert_eq!(report.sender.units_sent, 0);
    assert_eq!(report.sender.connection_failures, 1);
    assert_eq!(report.chunks, 0);
    assert_eq!(report.transport.connections_failed, 1);
    assert!(scenario.recorder().unwrap().is_empty());

    logs_assert(|lines: &[&str]| {
        match lines
            .iter()
            .filter(|line| line.contains("ConnectionFailed"))
            .count()
        {
            1 => Ok(()),
            n => Err(format!("expected one ConnectionFailed, logged {n}")),
        }
    });
}

#[test]
#[traced_test]
fn no_route_to_destination() {
    let mut network = Network::new();
    let client = network.new_node();
    let server = network.new_node();

    let mut sim = Simulation::new(network, TransportConfig::default());
    sim.stop_at(SimTime::from_secs(20));
    let sink = sim
        .install(server, PacketSink::new(50_000, LatencyRecorder::new()))
        .start_at(SimTime::from_secs(1))
        .build();
    let sender = PacedSender::configure(
        Address::new(server, 50_000),
        100,
        10.0,
        Duration::from_secs(10),
    )
    .unwrap();
    let sender = sim
        .install(client, sender)
        .start_at(SimTime::from_secs(2))
        .build();
    sim.run();

    let sender = sim.app(&sender).unwrap();
    assert_eq!(sender.state(), SenderState::Failed);
    assert_eq!(sender.stats().connection_failures, 1);
    assert_eq!(sender.stats().units_sent, 0);
    assert!(sim.app(&sink).unwrap().handler().is_empty());
    assert!(logs_contain("ConnectionFailed"));
}

#[test]
#[traced_test]
fn undersized_chunk() {
    let mut recorder = LatencyRecorder::new();
    let from = Address::new(NodeId::ZERO, 49_153);

    assert_eq!(
        recorder.record(&[1, 2, 3, 4], from, SimTime::from_secs(3)),
        Err(RecordError::UndersizedPayload { len: 4 })
    );
    assert!(recorder.is_empty());
    assert_eq!(recorder.undersized(), 1);
    assert!(logs_contain("UndersizedPayload"));
}

/// Connects to its destination and sends one 4 bytes chunk.
struct Runt {
    destination: Address,
}

impl Application for Runt {
    fn start(&mut self, ctx: &mut Context<'_>) {
        let conn = ctx.create_endpoint().unwrap();
        ctx.connect(conn, self.destination).unwrap();
    }

    fn stop(&mut self, _: &mut Context<'_>) {}

    fn on_connect_succeeded(&mut self, ctx: &mut Context<'_>, conn: ConnectionId) {
        ctx.send(conn, vec![0xde, 0xad, 0xbe, 0xef]).unwrap();
    }
}

#[test]
#[traced_test]
fn undersized_chunk_through_the_sink() {
    let mut network = Network::new();
    let client = network.new_node();
    let server = network.new_node();
    network.configure_link(client, server).apply();

    let mut sim = Simulation::new(network, TransportConfig::default());
    let sink = sim
        .install(server, PacketSink::new(50_000, LatencyRecorder::new()))
        .build();
    sim.install(
        client,
        Runt {
            destination: Address::new(server, 50_000),
        },
    )
    .start_at(SimTime::from_secs(1))
    .build();
    sim.run();

    let sink = sim.app(&sink).unwrap();
    assert_eq!(sink.chunks(), 1);
    assert!(sink.handler().is_empty());
    assert_eq!(sink.handler().undersized(), 1);
    assert!(logs_contain("UndersizedPayload"));
}

#[test]
fn lossy_link_keeps_order() {
    let config = ScenarioConfig {
        packet_loss: PacketLoss::rate(0.2).unwrap(),
        sender_stop: SimTime::from_secs(100),
        sink_stop: SimTime::from_secs(100),
        stop_time: None,
        transport: TransportConfig {
            syn_retries: 16,
            data_retries: 16,
            ..TransportConfig::default()
        },
        ..ScenarioConfig::default()
    };
    let mut scenario = Scenario::with_handler(&config, Timeline::default()).unwrap();
    let report = scenario.run();

    assert_eq!(report.sender.units_sent, 100);
    assert_eq!(report.chunks, 100);
    assert!(report.transport.retransmissions > 0);
    assert_eq!(report.run.pending, 0);

    let units = &scenario.handler().unwrap().units;
    assert!(units.windows(2).all(|pair| pair[0].0 < pair[1].0));
    assert!(units.windows(2).all(|pair| pair[0].1 <= pair[1].1));
    assert!(
        units
            .iter()
            .any(|&(sent, received)| received - sent >= Duration::from_secs(1)),
        "a lost unit waits at least one retransmission timeout"
    );
}

#[test]
fn same_seed_same_latencies() {
    let config = ScenarioConfig {
        packet_loss: PacketLoss::rate(0.1).unwrap(),
        seed: 42,
        stop_time: None,
        sink_stop: SimTime::from_secs(60),
        ..ScenarioConfig::default()
    };

    let run = || {
        let mut scenario = Scenario::build(&config).unwrap();
        scenario.run();
        scenario.recorder().unwrap().samples().to_vec()
    };
    assert_eq!(run(), run());
}

#[test]
#[traced_test]
fn sender_stopped_early() {
    let config = ScenarioConfig {
        sender_stop: SimTime::from_secs(5),
        ..ScenarioConfig::default()
    };
    let mut scenario = Scenario::build(&config).unwrap();
    let report = scenario.run();

    // units at 2s, 2.1s, ..., 4.9s; the step due right after 5s is refused
    assert_eq!(report.sender.units_sent, 30);
    assert_eq!(report.sender.invalid_handle_steps, 1);
    assert_eq!(scenario.recorder().unwrap().len(), 30);
    assert!(logs_contain("InvalidHandle"));
}

#[test]
fn export_one_line_per_unit() {
    let mut scenario = Scenario::build(&ScenarioConfig::default()).unwrap();
    scenario.run();

    let path = std::env::temp_dir().join(format!("latprobe-{}.txt", std::process::id()));
    scenario.export(&path).unwrap();
    let exported = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(exported.lines().count(), 100);
    assert!(
        exported
            .lines()
            .all(|line| line.parse::<f64>().unwrap() == 0.000031136)
    );

    let recorder = scenario.recorder_mut().unwrap();
    recorder.clear();
    assert!(recorder.is_empty());
    assert!(scenario.recorder().unwrap().is_empty());
}
