use anyhow::{Result, anyhow, bail, ensure};
use core::fmt;
use logos::{Lexer, Logos};
use std::{
    ops::{Add, AddAssign, Sub},
    str::FromStr,
    time,
};

/// A point on the simulation's virtual clock.
///
/// The clock starts at [`SimTime::ZERO`] and only moves forward as the
/// [`Scheduler`] pops events. It has nanosecond resolution and has no
/// relation whatsoever with the wall clock.
///
/// ```
/// # use latprobe_core::time::SimTime;
/// # use std::time::Duration;
/// let t = SimTime::from_secs(2) + Duration::from_millis(100);
/// assert_eq!(t.as_nanos(), 2_100_000_000);
/// assert_eq!(t.to_string(), "2.1s");
/// ```
///
/// [`Scheduler`]: crate::scheduler::Scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// the [`SimTime`] that is `duration` after [`SimTime::ZERO`]
    ///
    /// saturates at [`SimTime::MAX`] for durations that do not fit
    /// in 64 bits of nanoseconds (~584 years).
    pub fn from_duration(duration: time::Duration) -> Self {
        Self(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }

    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// elapsed time since [`SimTime::ZERO`]
    #[inline]
    pub fn into_duration(self) -> time::Duration {
        time::Duration::from_nanos(self.0)
    }

    /// time elapsed between `earlier` and `self`, zero if `earlier`
    /// is actually later.
    #[inline]
    pub fn saturating_duration_since(self, earlier: Self) -> time::Duration {
        time::Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<time::Duration> for SimTime {
    type Output = Self;

    fn add(self, rhs: time::Duration) -> Self::Output {
        let rhs = u64::try_from(rhs.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(rhs))
    }
}

impl AddAssign<time::Duration> for SimTime {
    fn add_assign(&mut self, rhs: time::Duration) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = time::Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Duration::new(self.into_duration()).fmt(f)
    }
}

/// Parse a duration written in the `1s 500ms` notation.
///
/// Accepted measures are `ns`, `us` (or `µs`), `ms`, `s` and `m`. Several
/// terms are summed up.
///
/// ```
/// # use latprobe_core::time::parse_duration;
/// # use std::time::Duration;
/// assert_eq!(parse_duration("30us").unwrap(), Duration::from_micros(30));
/// assert_eq!(parse_duration("1s 500ms").unwrap(), Duration::from_millis(1_500));
/// ```
pub fn parse_duration(s: &str) -> Result<time::Duration> {
    s.parse::<Duration>().map(Duration::into_duration)
}

/// Error returned when a duration (or a [`Latency`]) fails to parse.
///
/// [`Latency`]: crate::measure::Latency
pub type DurationParseError = anyhow::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub(crate) struct Duration(time::Duration);

impl Duration {
    pub(crate) fn new(dur: time::Duration) -> Self {
        Self(dur)
    }

    #[inline]
    pub fn into_duration(self) -> time::Duration {
        self.0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <time::Duration as fmt::Debug>::fmt(&self.0, f)
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::new(s);

        let mut total = time::Duration::ZERO;
        let mut terms = 0usize;

        while let Some(next) = lex.next() {
            let number: Token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;

            ensure!(
                number == Token::Value,
                "Expecting duration to starts with number. Cannot parse {s}"
            );
            let number: u64 = lex.slice().parse()?;

            let Some(Ok(measure)) = lex.next() else {
                bail!("Expecting a measure, failed to parse: {s}")
            };
            let duration = match measure {
                Token::NanoSeconds => time::Duration::from_nanos(number),
                Token::MicroSeconds => time::Duration::from_micros(number),
                Token::MilliSeconds => time::Duration::from_millis(number),
                Token::Seconds => time::Duration::from_secs(number),
                Token::Minutes => time::Duration::from_secs(number.saturating_mul(60)),
                Token::Value => bail!("Failed to parse `{s}', expecting a measure."),
            };
            total = total.saturating_add(duration);
            terms += 1;
        }

        ensure!(terms > 0, "Empty duration, expecting something like `30us'");

        Ok(Self(total))
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|µs|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex("[0-9]+")]
    Value,
}
