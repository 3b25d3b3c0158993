mod bandwidth;
mod latency;
mod packet_loss;

pub use self::{
    bandwidth::{Bandwidth, BandwidthParseError},
    latency::Latency,
    packet_loss::{PacketLoss, PacketLossParseError, PacketLossRate, PacketLossRateError},
};
