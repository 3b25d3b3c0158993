use super::{Application, Context};
use crate::{node::Address, time::SimTime, transport::ConnectionId};
use tracing::{debug, trace, warn};

/// Receiver of the chunks a [`PacketSink`] accepts.
///
/// Any `FnMut(&[u8], Address, SimTime)` closure is a handler.
///
/// ```
/// # use latprobe_core::{app::PacketSink, node::Address, time::SimTime};
/// let sink = PacketSink::new(50_000, |chunk: &[u8], _from: Address, _now: SimTime| {
///     println!("received {} bytes", chunk.len());
/// });
/// assert_eq!(sink.chunks(), 0);
/// ```
pub trait RxHandler {
    /// `chunk` sent by `from` was delivered at `now`.
    fn on_delivered(&mut self, chunk: &[u8], from: Address, now: SimTime);
}

impl<F> RxHandler for F
where
    F: FnMut(&[u8], Address, SimTime),
{
    fn on_delivered(&mut self, chunk: &[u8], from: Address, now: SimTime) {
        self(chunk, from, now)
    }
}

/// Application accepting everything sent to a port of its node.
///
/// The sink listens from its start to its stop. Every delivered chunk is
/// counted and passed on to the sink's [`RxHandler`]. Once stopped,
/// chunks arriving for the port are discarded by the transport.
#[derive(Debug)]
pub struct PacketSink<H> {
    port: u16,
    handler: H,

    listening: bool,
    chunks: u64,
    bytes: u64,
}

impl<H> PacketSink<H> {
    pub fn new(port: u16, handler: H) -> Self {
        Self {
            port,
            handler,
            listening: false,
            chunks: 0,
            bytes: 0,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// number of chunks received so far
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// number of payload bytes received so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

impl<H> Application for PacketSink<H>
where
    H: RxHandler + 'static,
{
    fn start(&mut self, ctx: &mut Context<'_>) {
        match ctx.listen(self.port) {
            Ok(address) => {
                self.listening = true;
                debug!(%address, "sink started");
            }
            Err(error) => warn!(port = self.port, %error, "sink cannot listen"),
        }
    }

    fn stop(&mut self, ctx: &mut Context<'_>) {
        if self.listening {
            ctx.unlisten(self.port);
            self.listening = false;
            debug!(
                port = self.port,
                chunks = self.chunks,
                bytes = self.bytes,
                "sink stopped"
            );
        }
    }

    fn on_delivered(
        &mut self,
        ctx: &mut Context<'_>,
        conn: ConnectionId,
        payload: &[u8],
        from: Address,
    ) {
        self.chunks += 1;
        self.bytes += payload.len() as u64;
        trace!(%conn, %from, len = payload.len(), "chunk received");

        self.handler.on_delivered(payload, from, ctx.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{network::Network, sim::Simulation, transport::TransportConfig};
    use tracing_test::traced_test;

    fn ignore(_: &[u8], _: Address, _: SimTime) {}

    #[test]
    #[traced_test]
    fn port_already_taken() {
        let mut network = Network::new();
        let node = network.new_node();
        let mut sim = Simulation::new(network, TransportConfig::default());

        let first = sim
            .install(node, PacketSink::new(9, ignore))
            .stop_at(SimTime::from_secs(1))
            .build();
        let second = sim.install(node, PacketSink::new(9, ignore)).build();
        sim.run();

        assert!(!sim.app(&first).unwrap().is_listening());
        assert!(!sim.app(&second).unwrap().is_listening());
        assert!(logs_contain("sink cannot listen"));
    }

    #[test]
    fn closures_are_handlers() {
        let mut seen = Vec::new();
        let mut handler = |chunk: &[u8], _: Address, now: SimTime| seen.push((chunk.len(), now));

        handler.on_delivered(&[0; 4], Address::new(crate::node::NodeId::ONE, 1), SimTime::ZERO);
        assert_eq!(seen, vec![(4, SimTime::ZERO)]);
    }
}
