use rand_core::Rng;
use std::{fmt, str::FromStr};

/// Probabilistic loss model of a [`Link`].
///
/// Every transmission attempt of a segment on the link is independently
/// dropped with the configured probability. The transport recovers the
/// loss by retransmitting the segment after its retransmission timeout.
///
/// # Example
///
/// ```
/// use latprobe_core::measure::PacketLoss;
///
/// let lossy = PacketLoss::rate(0.01).unwrap();
/// assert_eq!(lossy.to_string(), "1%");
///
/// let parsed: PacketLoss = "1%".parse().unwrap();
/// assert_eq!(parsed, lossy);
/// ```
///
/// [`Link`]: crate::link::Link
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub enum PacketLoss {
    /// Nothing is ever dropped (default).
    #[default]
    None,
    /// Each attempt is dropped with the given probability.
    Rate(PacketLossRate),
}

/// A loss probability, always within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketLossRate(f64);

/// Error returned when constructing a [`PacketLossRate`] outside `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("packet loss rate must be in [0.0, 1.0], got {0}")]
pub struct PacketLossRateError(f64);

/// Error returned when parsing a [`PacketLoss`] from a string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PacketLossParseError {
    #[error("expected '%' suffix")]
    MissingSuffix,
    #[error("invalid number before '%'")]
    InvalidNumber,
    #[error("{0}")]
    OutOfRange(#[from] PacketLossRateError),
}

impl PacketLoss {
    /// # Errors
    ///
    /// Fails if `rate` is not in `[0.0, 1.0]` (NaN included).
    pub fn rate(rate: f64) -> Result<Self, PacketLossRateError> {
        PacketLossRate::new(rate).map(PacketLoss::Rate)
    }

    /// Draw from `rng` whether the current attempt is lost.
    ///
    /// The generator is owned by the [`Network`] so that one seed decides
    /// every drop of a run.
    ///
    /// [`Network`]: crate::network::Network
    pub fn should_drop<R: Rng>(&self, rng: &mut R) -> bool {
        match self {
            PacketLoss::None => false,
            PacketLoss::Rate(rate) => {
                let sample = (rng.next_u64() as f64) * (1.0 / (u64::MAX as f64 + 1.0));
                sample < rate.0
            }
        }
    }
}

impl PacketLossRate {
    pub fn new(rate: f64) -> Result<Self, PacketLossRateError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(PacketLossRateError(rate));
        }
        Ok(Self(rate))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for PacketLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketLoss::None => write!(f, "0%"),
            PacketLoss::Rate(rate) => rate.fmt(f),
        }
    }
}

impl fmt::Display for PacketLossRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = self.0 * 100.0;
        if pct.fract() == 0.0 {
            write!(f, "{}%", pct as u64)
        } else {
            write!(f, "{pct:.2}%")
        }
    }
}

impl FromStr for PacketLoss {
    type Err = PacketLossParseError;

    /// `"0%"`, `"1%"`, `"12.5%"`... the `%` is mandatory.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let num = s
            .trim()
            .strip_suffix('%')
            .ok_or(PacketLossParseError::MissingSuffix)?;
        let pct: f64 = num
            .trim()
            .parse()
            .map_err(|_| PacketLossParseError::InvalidNumber)?;

        if pct == 0.0 {
            Ok(PacketLoss::None)
        } else {
            Ok(PacketLoss::rate(pct / 100.0)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaChaRng;
    use rand_core::SeedableRng as _;

    fn rng() -> ChaChaRng {
        ChaChaRng::seed_from_u64(42)
    }

    #[test]
    fn none_never_drops() {
        let mut rng = rng();
        assert!((0..1_000).all(|_| !PacketLoss::None.should_drop(&mut rng)));
    }

    #[test]
    fn rate_one_always_drops() {
        let mut rng = rng();
        let loss = PacketLoss::rate(1.0).unwrap();
        assert!((0..1_000).all(|_| loss.should_drop(&mut rng)));
    }

    #[test]
    fn rate_tenth_approximately() {
        let loss = PacketLoss::rate(0.1).unwrap();
        let mut rng = rng();
        let drops = (0..10_000).filter(|_| loss.should_drop(&mut rng)).count();
        assert!(drops > 800 && drops < 1_200, "drop rate was {drops}/10000");
    }

    #[test]
    fn reproducible_with_same_seed() {
        let loss = PacketLoss::rate(0.3).unwrap();
        let draw = |seed| {
            let mut rng = ChaChaRng::seed_from_u64(seed);
            (0..100).map(|_| loss.should_drop(&mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(draw(99), draw(99));
    }

    #[test]
    fn invalid_rates_rejected() {
        assert!(PacketLoss::rate(f64::NAN).is_err());
        assert!(PacketLoss::rate(-0.1).is_err());
        assert!(PacketLoss::rate(1.5).is_err());
        assert_eq!(
            PacketLoss::rate(2.0).unwrap_err().to_string(),
            "packet loss rate must be in [0.0, 1.0], got 2"
        );
    }

    #[test]
    fn display() {
        assert_eq!(PacketLoss::None.to_string(), "0%");
        assert_eq!(PacketLoss::rate(0.05).unwrap().to_string(), "5%");
        assert_eq!(PacketLoss::rate(0.125).unwrap().to_string(), "12.50%");
    }

    #[test]
    fn parse() {
        assert_eq!("0%".parse::<PacketLoss>().unwrap(), PacketLoss::None);
        assert_eq!(
            "100%".parse::<PacketLoss>().unwrap(),
            PacketLoss::rate(1.0).unwrap()
        );
        assert!("5".parse::<PacketLoss>().is_err());
        assert!("abc%".parse::<PacketLoss>().is_err());
        assert!("150%".parse::<PacketLoss>().is_err());
    }
}
