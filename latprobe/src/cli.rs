use crate::scenario::{
    DEFAULT_DURATION, DEFAULT_OUTPUT, DEFAULT_PORT, DEFAULT_RATE, DEFAULT_UNIT_SIZE,
    ScenarioConfig,
};
use anyhow::Result;
use clap::Parser;
use latprobe_core::{
    defaults::{DEFAULT_RETRANSMISSION_TIMEOUT, DEFAULT_SEGMENT_SIZE},
    measure::{Bandwidth, Latency, PacketLoss},
    time::{SimTime, parse_duration},
    transport::TransportConfig,
};
use std::{path::PathBuf, time::Duration};

/// Send timestamped units at a fixed rate over a simulated link and
/// record the latency of each of them.
#[derive(Debug, Parser)]
#[command(name = "latprobe", version, about)]
pub struct Command {
    /// bytes per unit, the first 8 carry the send time
    #[arg(long, default_value_t = DEFAULT_UNIT_SIZE)]
    pub unit_size: usize,

    /// units sent per simulated second
    #[arg(long, default_value_t = DEFAULT_RATE)]
    pub rate: f64,

    /// how long the sender sends for (e.g. `10s`, `1s 500ms`)
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub duration: Duration,

    #[arg(long, default_value = "2s", value_parser = parse_sim_time)]
    pub sender_start: SimTime,

    #[arg(long, default_value = "20s", value_parser = parse_sim_time)]
    pub sender_stop: SimTime,

    #[arg(long, default_value = "1s", value_parser = parse_sim_time)]
    pub sink_start: SimTime,

    #[arg(long, default_value = "12s", value_parser = parse_sim_time)]
    pub sink_stop: SimTime,

    /// port the sink listens on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// connect to a port nothing listens on
    #[arg(long)]
    pub unreachable: bool,

    /// one-way propagation delay of the link
    #[arg(long, default_value = "30us")]
    pub latency: Latency,

    #[arg(long, default_value = "1gbps")]
    pub bandwidth: Bandwidth,

    /// probability for each transmission to be lost (e.g. `1%`)
    #[arg(long, default_value = "0%")]
    pub packet_loss: PacketLoss,

    /// seed of the packet loss draws
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// simulated time at which the run halts
    #[arg(long, default_value = "20s", value_parser = parse_sim_time, conflicts_with = "no_stop")]
    pub stop: SimTime,

    /// run until there is nothing left to simulate
    #[arg(long)]
    pub no_stop: bool,

    /// largest payload of a transport segment, in bytes
    #[arg(long, default_value_t = DEFAULT_SEGMENT_SIZE)]
    pub segment_size: usize,

    /// retransmission timeout of the transport
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub rto: Duration,

    /// file the latencies are written to, one per line
    #[arg(long, short, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// log at debug level unless `RUST_LOG` says otherwise
    #[arg(long, short)]
    pub verbose: bool,
}

fn parse_sim_time(s: &str) -> Result<SimTime> {
    parse_duration(s).map(SimTime::from_duration)
}

impl Command {
    pub fn into_config(self) -> ScenarioConfig {
        let transport = TransportConfig {
            segment_size: self.segment_size,
            retransmission_timeout: self.rto,
            ..TransportConfig::default()
        };

        ScenarioConfig {
            unit_size: self.unit_size,
            rate: self.rate,
            duration: self.duration,
            sender_start: self.sender_start,
            sender_stop: self.sender_stop,
            sink_start: self.sink_start,
            sink_stop: self.sink_stop,
            port: self.port,
            unreachable: self.unreachable,
            latency: self.latency,
            bandwidth: self.bandwidth,
            packet_loss: self.packet_loss,
            seed: self.seed,
            stop_time: (!self.no_stop).then_some(self.stop),
            output: self.output,
            transport,
        }
    }
}
