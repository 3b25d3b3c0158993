//! The paced sender: a connection, then one timestamped unit every
//! interval until the budget is spent.

mod schedule;

pub use self::schedule::SendSchedule;
use crate::unit::{TIMESTAMP_LEN, Unit};
use latprobe_core::{
    app::{Application, Context, TimerToken},
    node::Address,
    time::SimTime,
    transport::{ConnectError, ConnectionId, TransportError},
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

const EMIT: TimerToken = TimerToken::new(0);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SenderError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Connection to {destination} failed: {reason}")]
    ConnectionFailed {
        destination: Address,
        reason: ConnectFailure,
    },
    #[error("Emission step without a live connection (sender is {state:?})")]
    InvalidHandle { state: SenderState },
    #[error("Cannot send unit: {0}")]
    Send(#[from] TransportError),
}

/// Why the sender could not connect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectFailure {
    /// the transport reported the handshake failure
    #[error("{0}")]
    Rejected(#[from] ConnectError),
    /// the connection attempt could not even be started
    #[error("{0}")]
    Transport(#[from] TransportError),
}

/// Life cycle of a [`PacedSender`].
///
/// ```text
/// Idle -> Connecting -> Emitting -> Exhausted
///             |
///             +-------> Failed
/// ```
///
/// Stopping the sender from any state but `Idle` ends in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Connecting { conn: ConnectionId },
    Emitting { conn: ConnectionId },
    /// every unit of the budget was handed to the transport
    Exhausted { conn: ConnectionId },
    Failed,
    Closed,
}

impl SenderState {
    /// the connection held in this state, if any
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            Self::Connecting { conn } | Self::Emitting { conn } | Self::Exhausted { conn } => {
                Some(*conn)
            }
            Self::Idle | Self::Failed | Self::Closed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// units accepted by the transport
    pub units_sent: u64,
    pub connection_failures: u64,
    /// emission steps that found no live connection
    pub invalid_handle_steps: u64,
    /// units the transport refused
    pub send_errors: u64,
    pub first_sent_at: Option<SimTime>,
    pub last_sent_at: Option<SimTime>,
}

/// Application sending `budget` timestamped units at a fixed rate over
/// one connection.
///
/// On start the sender connects to its destination. Once connected, the
/// first unit goes out immediately and every following unit exactly one
/// interval after the previous one. Each unit carries the simulated time
/// it was sent at (see [`Unit`]).
///
/// Nothing that goes wrong at run time stops the simulation: a failed
/// connection, an emission step after the sender was stopped or a unit
/// the transport refuses are logged, counted in [`SenderStats`] and kept
/// in [`PacedSender::diagnostics`].
#[derive(Debug)]
pub struct PacedSender {
    destination: Address,
    unit_size: usize,
    schedule: SendSchedule,

    state: SenderState,
    stats: SenderStats,
    diagnostics: Vec<SenderError>,
}

impl PacedSender {
    /// # Errors
    ///
    /// [`SenderError::InvalidConfiguration`] if the units are too small
    /// to carry the timestamp or if the [`SendSchedule`] is degenerate.
    pub fn configure(
        destination: Address,
        unit_size: usize,
        rate: f64,
        duration: Duration,
    ) -> Result<Self, SenderError> {
        if unit_size < TIMESTAMP_LEN {
            return Err(SenderError::InvalidConfiguration(format!(
                "unit size of {unit_size} bytes cannot hold the {TIMESTAMP_LEN} bytes timestamp"
            )));
        }

        Ok(Self {
            destination,
            unit_size,
            schedule: SendSchedule::new(rate, duration)?,
            state: SenderState::Idle,
            stats: SenderStats::default(),
            diagnostics: Vec::new(),
        })
    }

    pub fn destination(&self) -> Address {
        self.destination
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    pub fn schedule(&self) -> &SendSchedule {
        &self.schedule
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// every run-time error met so far, oldest first
    pub fn diagnostics(&self) -> &[SenderError] {
        &self.diagnostics
    }

    fn connection_failed(&mut self, reason: ConnectFailure) {
        self.state = SenderState::Failed;
        self.stats.connection_failures += 1;

        let error = SenderError::ConnectionFailed {
            destination: self.destination,
            reason,
        };
        warn!(%error, "ConnectionFailed");
        self.diagnostics.push(error);
    }

    fn emit(&mut self, ctx: &mut Context<'_>) {
        let SenderState::Emitting { conn } = self.state else {
            self.stats.invalid_handle_steps += 1;
            let error = SenderError::InvalidHandle { state: self.state };
            warn!(%error, "InvalidHandle: emission step skipped");
            self.diagnostics.push(error);
            return;
        };
        let Some(index) = self.schedule.next() else {
            self.state = SenderState::Exhausted { conn };
            return;
        };

        let now = ctx.now();
        let unit = Unit::stamped(now, self.unit_size);
        match ctx.send(conn, unit.into_bytes()) {
            Ok(()) => {
                self.stats.units_sent += 1;
                self.stats.first_sent_at.get_or_insert(now);
                self.stats.last_sent_at = Some(now);
                trace!(%conn, index, sent_at = %now, "unit sent");
            }
            Err(error) => {
                self.stats.send_errors += 1;
                warn!(%conn, index, %error, "unit not sent");
                self.diagnostics.push(SenderError::Send(error));
            }
        }

        if self.schedule.is_exhausted() {
            self.state = SenderState::Exhausted { conn };
            info!(
                %conn,
                units = self.stats.units_sent,
                "budget exhausted, no more units to send"
            );
        } else {
            ctx.schedule_in(self.schedule.interval(), EMIT);
        }
    }
}

impl Application for PacedSender {
    fn start(&mut self, ctx: &mut Context<'_>) {
        if self.state != SenderState::Idle {
            warn!(state = ?self.state, "sender already started");
            return;
        }

        let conn = match ctx.create_endpoint() {
            Ok(conn) => conn,
            Err(error) => return self.connection_failed(error.into()),
        };
        if let Err(error) = ctx.connect(conn, self.destination) {
            close(ctx, conn);
            return self.connection_failed(error.into());
        }

        info!(
            %conn,
            destination = %self.destination,
            budget = self.schedule.budget(),
            interval = ?self.schedule.interval(),
            "sender connecting"
        );
        self.state = SenderState::Connecting { conn };
    }

    fn stop(&mut self, ctx: &mut Context<'_>) {
        match self.state {
            SenderState::Idle => debug!("sender stopped before it started"),
            SenderState::Closed => (),
            SenderState::Failed => self.state = SenderState::Closed,
            SenderState::Connecting { conn }
            | SenderState::Emitting { conn }
            | SenderState::Exhausted { conn } => {
                let connection = ctx.connection_state(conn);
                close(ctx, conn);
                info!(
                    %conn,
                    ?connection,
                    units = self.stats.units_sent,
                    budget = self.schedule.budget(),
                    "sender stopped"
                );
                self.state = SenderState::Closed;
            }
        }
    }

    fn on_timer(&mut self, ctx: &mut Context<'_>, token: TimerToken) {
        if token == EMIT {
            self.emit(ctx);
        }
    }

    fn on_connect_succeeded(&mut self, ctx: &mut Context<'_>, conn: ConnectionId) {
        if self.state != (SenderState::Connecting { conn }) {
            debug!(%conn, state = ?self.state, "connection no longer wanted");
            return;
        }

        info!(%conn, "sender connected");
        self.state = SenderState::Emitting { conn };
        self.emit(ctx);
    }

    fn on_connect_failed(
        &mut self,
        ctx: &mut Context<'_>,
        conn: ConnectionId,
        error: ConnectError,
    ) {
        if self.state != (SenderState::Connecting { conn }) {
            return;
        }

        close(ctx, conn);
        self.connection_failed(error.into());
    }
}

fn close(ctx: &mut Context<'_>, conn: ConnectionId) {
    if let Err(error) = ctx.close(conn) {
        warn!(%conn, %error, "cannot close connection");
    }
}
