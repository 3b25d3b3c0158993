//! Extraction, aggregation and export of the per-unit latencies.

use crate::unit::{TIMESTAMP_LEN, decode_timestamp};
use latprobe_core::{app::RxHandler, node::Address, time::SimTime};
use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};
use thiserror::Error;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(
        "Undersized payload: {len} bytes, a unit starts with a {} bytes timestamp",
        TIMESTAMP_LEN
    )]
    UndersizedPayload { len: usize },
}

/// Latencies, in seconds, of the units delivered to a sink.
///
/// Samples are kept in arrival order and are never reordered: the
/// recorder only appends, [`LatencyRecorder::export`] writes them back
/// as they came.
///
/// ```
/// # use latprobe::{recorder::LatencyRecorder, unit::Unit};
/// # use latprobe_core::{node::{Address, NodeId}, time::SimTime};
/// let mut recorder = LatencyRecorder::new();
/// let from = Address::new(NodeId::ONE, 49_153);
///
/// let unit = Unit::stamped(SimTime::from_secs(2), 100);
/// let latency = recorder
///     .record(unit.as_bytes(), from, SimTime::from_nanos(2_000_031_136))
///     .unwrap();
/// assert_eq!(latency, 0.000031136);
///
/// let mut out = Vec::new();
/// recorder.export(&mut out).unwrap();
/// assert_eq!(out, b"0.000031136\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LatencyRecorder {
    samples: Vec<f64>,
    undersized: u64,
    negative: u64,
}

/// Aggregates over the samples of a [`LatencyRecorder`], in seconds.
///
/// Percentiles use the nearest-rank method: `p50` is a recorded sample,
/// never an interpolation between two.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl LatencyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the send time at the head of `chunk` and record how long
    /// ago, at `now`, it was sent.
    ///
    /// A negative latency means the send time lies in the future. It is
    /// recorded as is, and reported.
    ///
    /// # Errors
    ///
    /// [`RecordError::UndersizedPayload`] if the chunk is too short to
    /// carry a timestamp. Nothing is recorded.
    pub fn record(
        &mut self,
        chunk: &[u8],
        from: Address,
        now: SimTime,
    ) -> Result<f64, RecordError> {
        let Some(sent_at) = decode_timestamp(chunk) else {
            self.undersized += 1;
            let error = RecordError::UndersizedPayload { len: chunk.len() };
            warn!(%from, %error, "UndersizedPayload: chunk discarded");
            return Err(error);
        };

        let nanos = i128::from(now.as_nanos()) - i128::from(sent_at.as_nanos());
        let latency = nanos as f64 / 1e9;

        if latency < 0.0 {
            self.negative += 1;
            warn!(
                %from,
                %sent_at,
                received_at = %now,
                latency,
                "negative latency, clocks are inconsistent"
            );
        } else {
            trace!(%from, %sent_at, latency, "latency recorded");
        }

        self.samples.push(latency);
        Ok(latency)
    }

    /// samples in arrival order
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// number of chunks discarded for being too short
    pub fn undersized(&self) -> u64 {
        self.undersized
    }

    /// number of negative samples recorded
    pub fn negative(&self) -> u64 {
        self.negative
    }

    /// Write one sample per line, in arrival order.
    ///
    /// Samples use the shortest decimal representation that reads back
    /// to the same `f64`. There is no header.
    pub fn export<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for sample in &self.samples {
            writeln!(writer, "{sample}")?;
        }
        writer.flush()
    }

    /// [`export`](Self::export) to the file at `path`, replacing its
    /// content if it exists.
    pub fn export_to_path(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        self.export(BufWriter::new(file))
    }

    /// Drop every sample and counter.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.undersized = 0;
        self.negative = 0;
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    /// `None` until something was recorded.
    pub fn summary(&self) -> Option<LatencySummary> {
        let sorted = self.sorted();
        let (&min, &max) = (sorted.first()?, sorted.last()?);
        let count = sorted.len();

        let nearest_rank = |percentile: f64| {
            let rank = (percentile / 100.0 * count as f64).ceil() as usize;
            sorted[rank.clamp(1, count) - 1]
        };

        Some(LatencySummary {
            count,
            min,
            max,
            mean: sorted.iter().sum::<f64>() / count as f64,
            p50: nearest_rank(50.0),
            p90: nearest_rank(90.0),
            p99: nearest_rank(99.0),
        })
    }

    /// Empirical cumulative distribution of the samples: each sample,
    /// smallest first, with the fraction of samples less or equal to it.
    pub fn cdf(&self) -> Vec<(f64, f64)> {
        let sorted = self.sorted();
        let count = sorted.len() as f64;

        sorted
            .into_iter()
            .enumerate()
            .map(|(i, sample)| (sample, (i + 1) as f64 / count))
            .collect()
    }
}

impl RxHandler for LatencyRecorder {
    fn on_delivered(&mut self, chunk: &[u8], from: Address, now: SimTime) {
        // the error is already logged and counted
        let _ = self.record(chunk, from, now);
    }
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={} min={} p50={} p90={} p99={} max={} mean={}",
            self.count, self.min, self.p50, self.p90, self.p99, self.max, self.mean
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Unit;
    use latprobe_core::node::NodeId;
    use tracing_test::traced_test;

    const FROM: Address = Address::new(NodeId::ONE, 49_153);

    fn record_at(recorder: &mut LatencyRecorder, sent: u64, received: u64) -> f64 {
        let unit = Unit::stamped(SimTime::from_nanos(sent), 100);
        recorder
            .record(unit.as_bytes(), FROM, SimTime::from_nanos(received))
            .unwrap()
    }

    fn with_samples(samples: &[u64]) -> LatencyRecorder {
        let mut recorder = LatencyRecorder::new();
        for latency in samples {
            record_at(&mut recorder, 1_000, 1_000 + latency);
        }
        recorder
    }

    #[test]
    fn latency_is_receive_minus_send() {
        let mut recorder = LatencyRecorder::new();

        assert_eq!(record_at(&mut recorder, 2_000_000_000, 2_000_031_136), 31_136e-9);
        assert_eq!(record_at(&mut recorder, 5, 5), 0.0);
        assert_eq!(recorder.samples(), &[31_136e-9, 0.0]);
    }

    #[test]
    #[traced_test]
    fn undersized_payloads_are_discarded() {
        let mut recorder = LatencyRecorder::new();

        assert_eq!(
            recorder.record(&[1, 2, 3, 4], FROM, SimTime::from_secs(1)),
            Err(RecordError::UndersizedPayload { len: 4 })
        );
        assert!(recorder.is_empty());
        assert_eq!(recorder.undersized(), 1);
        assert!(logs_contain("UndersizedPayload"));
    }

    #[test]
    fn exact_size_payload_is_accepted() {
        let mut recorder = LatencyRecorder::new();
        let chunk = 1_000u64.to_le_bytes();

        assert!(recorder.record(&chunk, FROM, SimTime::from_nanos(2_000)).is_ok());
        assert_eq!(recorder.samples(), &[1e-6]);
    }

    #[test]
    #[traced_test]
    fn negative_latency_is_kept() {
        let mut recorder = LatencyRecorder::new();

        assert_eq!(record_at(&mut recorder, 3_000_000_000, 1_000_000_000), -2.0);
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.negative(), 1);
        assert!(logs_contain("negative latency"));
    }

    #[test]
    fn export_keeps_arrival_order() {
        let recorder = with_samples(&[30_000, 10_000, 1_000_031_136, 20_000]);

        let mut out = Vec::new();
        recorder.export(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0.00003\n0.00001\n1.000031136\n0.00002\n"
        );
    }

    #[test]
    fn export_nothing() {
        let mut out = Vec::new();
        LatencyRecorder::new().export(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn export_truncates_existing_file() {
        let path = std::env::temp_dir().join(format!(
            "latprobe-recorder-{}.txt",
            std::process::id()
        ));
        std::fs::write(&path, "stale\nstale\nstale\n").unwrap();

        with_samples(&[42_000]).export_to_path(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(content, "0.000042\n");
    }

    #[test]
    fn clear() {
        let mut recorder = with_samples(&[1, 2]);
        let _ = recorder.record(&[], FROM, SimTime::ZERO);

        recorder.clear();
        assert!(recorder.is_empty());
        assert_eq!(recorder.undersized(), 0);
    }

    #[test]
    fn summary() {
        assert!(LatencyRecorder::new().summary().is_none());

        let samples: Vec<u64> = (1..=100).rev().map(|i| i * 1_000).collect();
        let summary = with_samples(&samples).summary().unwrap();

        assert_eq!(summary.count, 100);
        assert_eq!(summary.min, 1e-6);
        assert_eq!(summary.max, 1e-4);
        assert_eq!(summary.p50, 5e-5);
        assert_eq!(summary.p90, 9e-5);
        assert_eq!(summary.p99, 9.9e-5);
        assert!((summary.mean - 5.05e-5).abs() < 1e-15);
    }

    #[test]
    fn summary_of_one() {
        let summary = with_samples(&[7_000]).summary().unwrap();
        assert_eq!(summary.p50, summary.p99);
        assert_eq!(summary.min, 7e-6);
    }

    #[test]
    fn cdf() {
        let recorder = with_samples(&[3_000, 1_000, 2_000, 4_000]);

        assert_eq!(
            recorder.cdf(),
            vec![(1e-6, 0.25), (2e-6, 0.5), (3e-6, 0.75), (4e-6, 1.0)]
        );
        // the samples themselves are untouched
        assert_eq!(recorder.samples()[0], 3e-6);
    }

    #[test]
    fn plugs_into_a_sink() {
        let mut recorder = LatencyRecorder::new();
        let unit = Unit::stamped(SimTime::from_secs(1), 8);

        RxHandler::on_delivered(&mut recorder, unit.as_bytes(), FROM, SimTime::from_secs(2));
        RxHandler::on_delivered(&mut recorder, &[0; 2], FROM, SimTime::from_secs(2));

        assert_eq!(recorder.samples(), &[1.0]);
        assert_eq!(recorder.undersized(), 1);
    }
}
