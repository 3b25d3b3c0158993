use logos::{Lexer, Logos};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;

/// Data rate of a link, in bits per second.
///
/// The [`Bandwidth`] is what determines how long a segment occupies the
/// transmitter before the next one can start: the serialisation delay.
///
/// Units use the networking (decimal) convention: `1kbps` is `1_000`
/// bits per second and `1gbps` is `1_000_000_000` bits per second.
///
/// # Default
///
/// The [`Default`] bandwidth is [`DEFAULT_BANDWIDTH`], `1gbps`.
///
/// # Example
///
/// ```
/// # use latprobe_core::measure::Bandwidth;
/// # use std::time::Duration;
/// let bw: Bandwidth = "1gbps".parse().unwrap();
///
/// // 142 bytes on the wire at 1gbps take 1.136µs
/// assert_eq!(
///     bw.transmission_time(142),
///     Some(Duration::from_nanos(1_136)),
/// );
/// ```
///
/// [`DEFAULT_BANDWIDTH`]: crate::defaults::DEFAULT_BANDWIDTH
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bandwidth(u64);

#[derive(Debug, Error)]
pub enum BandwidthParseError {
    #[error("Expecting to parse a number, cannot parse `{0}'")]
    MissingNumber(String),
    #[error("Expecting a unit (bps, kbps, mbps, gbps), cannot parse `{0}'")]
    MissingUnit(String),
    #[error("Bandwidth too large: `{0}'")]
    Overflow(String),
    #[error("Not expecting any other tokens to parse a bandwidth: `{0}'")]
    TrailingTokens(String),
}

const K: u64 = 1_000;
const M: u64 = 1_000 * K;
const G: u64 = 1_000 * M;

impl Bandwidth {
    /// the maximum bandwidth available
    ///
    /// Segments go through a link of this bandwidth without any
    /// (measurable) serialisation delay.
    pub const MAX: Self = Self(u64::MAX);

    /// create a new [`Bandwidth`] of `bits_per_sec` bits per second.
    pub const fn new(bits_per_sec: u64) -> Self {
        Self(bits_per_sec)
    }

    #[inline]
    pub const fn bits_per_sec(&self) -> u64 {
        self.0
    }

    /// Time needed to push `bytes` onto the wire, rounded up to the
    /// nanosecond.
    ///
    /// Returns `None` if the bandwidth is `0bps`: nothing can ever be
    /// transmitted.
    pub fn transmission_time(&self, bytes: u64) -> Option<Duration> {
        if self.0 == 0 {
            return None;
        }

        let bits = bytes as u128 * 8;
        let nanos = (bits * 1_000_000_000).div_ceil(self.0 as u128);

        Some(Duration::from_nanos(
            u64::try_from(nanos).unwrap_or(u64::MAX),
        ))
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;

        if v >= G && v % G == 0 {
            write!(f, "{}gbps", v / G)
        } else if v >= M && v % M == 0 {
            write!(f, "{}mbps", v / M)
        } else if v >= K && v % K == 0 {
            write!(f, "{}kbps", v / K)
        } else {
            write!(f, "{v}bps")
        }
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum BandwidthToken {
    #[token("bps")]
    Bps,
    #[regex("[kK]bps")]
    Kbps,
    #[regex("[mM]bps")]
    Mbps,
    #[regex("[gG]bps")]
    Gbps,

    #[regex("[0-9]+")]
    Value,
}

impl FromStr for Bandwidth {
    type Err = BandwidthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<BandwidthToken>::new(s);

        let Some(Ok(BandwidthToken::Value)) = lex.next() else {
            return Err(BandwidthParseError::MissingNumber(s.to_owned()));
        };
        let number: u64 = lex
            .slice()
            .parse()
            .map_err(|_| BandwidthParseError::Overflow(s.to_owned()))?;
        let multiplier = match lex.next() {
            Some(Ok(BandwidthToken::Bps)) => 1,
            Some(Ok(BandwidthToken::Kbps)) => K,
            Some(Ok(BandwidthToken::Mbps)) => M,
            Some(Ok(BandwidthToken::Gbps)) => G,
            _ => return Err(BandwidthParseError::MissingUnit(s.to_owned())),
        };

        if lex.next().is_some() {
            return Err(BandwidthParseError::TrailingTokens(s.to_owned()));
        }

        number
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| BandwidthParseError::Overflow(s.to_owned()))
    }
}

impl Default for Bandwidth {
    fn default() -> Self {
        crate::defaults::DEFAULT_BANDWIDTH
    }
}
