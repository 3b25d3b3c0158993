use std::{fmt, str::FromStr, time::Duration};

/// One-way propagation delay of a [`Link`].
///
/// This is the time the first bit of a segment takes to travel from one
/// end of the link to the other. The time it takes to put the segment on
/// the wire is accounted for separately by the link's [`Bandwidth`].
///
/// # Default [`Latency`]
///
/// ```
/// # use latprobe_core::measure::Latency;
/// assert_eq!(
///     Latency::default().to_string(),
///     "30µs"
/// )
/// ```
///
/// [`Link`]: crate::link::Link
/// [`Bandwidth`]: crate::measure::Bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Latency(u64);

impl Latency {
    /// The `0` latency. I.e. no propagation delay.
    ///
    pub const ZERO: Self = Self::new(Duration::ZERO);

    /// create a new latency with the given [`Duration`].
    ///
    /// The latency is precise up to the nanosecond, the resolution of the
    /// simulated clock.
    ///
    /// ```
    /// # use latprobe_core::measure::Latency;
    /// # use std::time::Duration;
    /// let latency = Latency::new(Duration::from_micros(30));
    /// assert_eq!(latency.into_duration().as_nanos(), 30_000);
    /// ```
    ///
    #[inline(always)]
    pub const fn new(duration: Duration) -> Self {
        Self(duration.as_nanos() as u64)
    }

    /// get the inner duration
    ///
    #[inline(always)]
    pub fn into_duration(self) -> Duration {
        Duration::from_nanos(self.0)
    }
}

impl From<Latency> for Duration {
    fn from(value: Latency) -> Self {
        value.into_duration()
    }
}
impl From<Duration> for Latency {
    fn from(value: Duration) -> Self {
        Self::new(value)
    }
}

impl Default for Latency {
    fn default() -> Self {
        crate::defaults::DEFAULT_LATENCY
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dur = crate::time::Duration::new(self.into_duration());
        dur.fmt(f)
    }
}

impl FromStr for Latency {
    type Err = crate::time::DurationParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let duration = crate::time::Duration::from_str(s)?;

        Ok(Self::new(duration.into_duration()))
    }
}
