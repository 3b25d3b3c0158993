use crate::{
    network::{Network, RouteError},
    node::NodeId,
    time::SimTime,
};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Arrives { at: SimTime, attempts: u32 },
    /// every attempt was lost, `at` is when the last timeout expires
    GaveUp { at: SimTime, attempts: u32 },
}

impl Delivery {
    pub(crate) fn attempts(&self) -> u32 {
        match self {
            Self::Arrives { attempts, .. } | Self::GaveUp { attempts, .. } => *attempts,
        }
    }
}

/// Transmit `bytes` until one attempt gets through or `retries`
/// retransmissions have been lost too.
///
/// A retransmission is handed to the link one `timeout` after the lost
/// attempt departed. All attempts are resolved now, the link reserves
/// its transmitter for the future ones straight away.
pub(crate) fn deliver(
    network: &mut Network,
    from: NodeId,
    to: NodeId,
    bytes: u64,
    now: SimTime,
    retries: u32,
    timeout: Duration,
) -> Result<Delivery, RouteError> {
    let mut at = now;
    let mut attempts = 0;

    loop {
        let transmission = network.transmit(from, to, bytes, at)?;
        attempts += 1;

        if !transmission.lost {
            return Ok(Delivery::Arrives {
                at: transmission.arrival,
                attempts,
            });
        }

        at = transmission.departure + timeout;
        if attempts > retries {
            return Ok(Delivery::GaveUp { at, attempts });
        }
    }
}
