//! Deterministic simulation substrate for latency measurements.
//!
//! A [`Simulation`] owns a virtual clock, a [`Network`] of nodes joined
//! by links with a latency, a bandwidth and a packet loss rate, and a
//! connection-oriented [`Transport`] on top of it. [`Application`]s
//! installed on the nodes react to their activation, to their own timers
//! and to the transport's notifications.
//!
//! Nothing ever runs on the wall clock: time only advances from one
//! scheduled event to the next, and with the same seed two runs produce
//! exactly the same events at exactly the same times.
//!
//! ```
//! use latprobe_core::{
//!     app::PacketSink, network::Network, node::Address, sim::Simulation,
//!     time::SimTime, transport::TransportConfig,
//! };
//!
//! let mut network = Network::new();
//! let client = network.new_node();
//! let server = network.new_node();
//! network
//!     .configure_link(client, server)
//!     .set_latency("30us".parse().unwrap())
//!     .apply();
//!
//! let mut sim = Simulation::new(network, TransportConfig::default());
//! sim.install(server, PacketSink::new(50_000, |_: &[u8], _: Address, _: SimTime| ()))
//!     .start_at(SimTime::from_secs(1))
//!     .build();
//! sim.stop_at(SimTime::from_secs(20));
//! sim.run();
//! ```
//!
//! [`Simulation`]: crate::sim::Simulation
//! [`Network`]: crate::network::Network
//! [`Transport`]: crate::transport::Transport
//! [`Application`]: crate::app::Application

pub mod app;
pub mod defaults;
pub mod link;
pub mod measure;
pub mod network;
pub mod node;
pub mod scheduler;
pub mod sim;
pub mod stats;
pub mod time;
pub mod transport;

pub use self::{
    measure::{Bandwidth, Latency, PacketLoss},
    time::SimTime,
};
