//! Latency probe over a simulated point-to-point path.
//!
//! A [`PacedSender`] sends fixed-size units at a fixed rate over one
//! reliable connection, each unit carrying the simulated time it was sent
//! at. On the far end a [`LatencyRecorder`] reads the timestamp back out
//! of every delivered unit and records how long it took to arrive. The
//! [`Scenario`] wires both on top of the [`latprobe_core`] simulation.
//!
//! ```
//! use latprobe::scenario::{Scenario, ScenarioConfig};
//!
//! let mut scenario = Scenario::build(&ScenarioConfig::default()).unwrap();
//! let report = scenario.run();
//! assert_eq!(report.sender.units_sent, 100);
//!
//! let recorder = scenario.recorder().unwrap();
//! assert_eq!(recorder.len(), 100);
//! assert!(recorder.samples().iter().all(|s| (30e-6..100e-6).contains(s)));
//! ```
//!
//! [`PacedSender`]: crate::sender::PacedSender
//! [`LatencyRecorder`]: crate::recorder::LatencyRecorder
//! [`Scenario`]: crate::scenario::Scenario

pub mod cli;
pub mod logging;
pub mod recorder;
pub mod scenario;
pub mod sender;
pub mod unit;
