use super::SenderError;
use std::{iter::FusedIterator, time::Duration};

/// The paced emission plan of a [`PacedSender`].
///
/// Yields the index of each emission, `0` to `budget - 1`, and nothing
/// afterward. Emission `i` is due `i` intervals after the first one.
///
/// ```
/// # use latprobe::sender::SendSchedule;
/// # use std::time::Duration;
/// let schedule = SendSchedule::new(10.0, Duration::from_secs(10)).unwrap();
///
/// assert_eq!(schedule.budget(), 100);
/// assert_eq!(schedule.interval(), Duration::from_millis(100));
/// assert_eq!(schedule.count(), 100);
/// ```
///
/// [`PacedSender`]: super::PacedSender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendSchedule {
    interval: Duration,
    budget: u64,
    emitted: u64,
}

impl SendSchedule {
    /// Plan `floor(rate × duration)` emissions, one every `1 / rate`
    /// seconds rounded to the nanosecond.
    ///
    /// # Errors
    ///
    /// [`SenderError::InvalidConfiguration`] if `rate` is not a finite
    /// positive number, if `duration` is zero, or if the plan would be
    /// degenerate: no emission at all, or emissions less than a
    /// nanosecond apart.
    pub fn new(rate: f64, duration: Duration) -> Result<Self, SenderError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(SenderError::InvalidConfiguration(format!(
                "rate must be a positive number of units per second, got {rate}"
            )));
        }
        if duration.is_zero() {
            return Err(SenderError::InvalidConfiguration(
                "duration must not be zero".to_owned(),
            ));
        }

        let budget = floor_product(rate, duration);
        if budget == 0 {
            return Err(SenderError::InvalidConfiguration(format!(
                "sending at {rate} units per second for {duration:?} sends nothing"
            )));
        }

        let interval = (1e9 / rate).round() as u64;
        if interval == 0 {
            return Err(SenderError::InvalidConfiguration(format!(
                "rate of {rate} units per second is beyond the clock resolution"
            )));
        }

        Ok(Self {
            interval: Duration::from_nanos(interval),
            budget,
            emitted: 0,
        })
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// total number of emissions
    #[inline]
    pub fn budget(&self) -> u64 {
        self.budget
    }

    #[inline]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.budget - self.emitted
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.emitted == self.budget
    }
}

/// `floor(rate × duration)`, with products a few ULPs short of a whole
/// number (`0.57 × 100s` is `56.99999999999999`) counted as that number.
fn floor_product(rate: f64, duration: Duration) -> u64 {
    let product = rate * duration.as_secs_f64();
    let nearest = product.round();
    if (product - nearest).abs() <= 4.0 * f64::EPSILON * product.abs() {
        nearest as u64
    } else {
        product.floor() as u64
    }
}

impl Iterator for SendSchedule {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }
        let index = self.emitted;
        self.emitted += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SendSchedule {}

impl FusedIterator for SendSchedule {}
