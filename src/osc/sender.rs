//! UDP bundle sender.
//!
//! One `FrameFeatureSet` becomes one OSC bundle becomes one `send_to` call.
//! Delivery is best effort: the sender never retries and never waits for the
//! receiver. A failed send is reported as `Error::Transmission` and the caller
//! decides whether to continue.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use super::bundle::{bundle_size_for, encode_feature_set};
use crate::analyze::FrameFeatureSet;
use crate::error::{Error, Result};

/// Destination for outbound bundles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolves the host once. The first resolved address wins.
    pub fn resolve(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| Error::config(format!("cannot resolve osc host {}: {}", self, e)))?
            .next()
            .ok_or_else(|| Error::config(format!("osc host {} resolved to no address", self)))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Consumer of per-frame feature sets.
///
/// `send` returns the number of bytes transmitted. Implementations must emit
/// at most one transmission unit per call.
pub trait FeatureSink {
    fn send(&mut self, features: &FrameFeatureSet) -> Result<usize>;
}

/// Counters for a sender's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub bundles_sent: u64,
    pub bytes_sent: u64,
}

/// Sends one OSC bundle per frame over UDP.
pub struct FeatureSender {
    socket: UdpSocket,
    target: SocketAddr,
    /// Reused encode buffer.
    buffer: Vec<u8>,
    stats: SenderStats,
}

impl FeatureSender {
    /// Binds an ephemeral local socket of the endpoint's address family.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        let target = endpoint.resolve()?;
        let bind_addr = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| Error::config(format!("bind udp socket on {}: {}", bind_addr, e)))?;
        log::info!(
            "FeatureSender: sending OSC bundles to {} from {}",
            target,
            socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".to_string())
        );
        Ok(Self {
            socket,
            target,
            buffer: Vec::new(),
            stats: SenderStats::default(),
        })
    }

    /// Pre-sizes the encode buffer for the grid's bundle size.
    pub fn with_capacity_for(mut self, shape: crate::grid::GridShape) -> Self {
        self.buffer.reserve(bundle_size_for(shape));
        self
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }
}

impl FeatureSink for FeatureSender {
    fn send(&mut self, features: &FrameFeatureSet) -> Result<usize> {
        let len = encode_feature_set(features, &mut self.buffer)?;
        let sent = self
            .socket
            .send_to(&self.buffer, self.target)
            .map_err(Error::Transmission)?;
        if sent != len {
            return Err(Error::Transmission(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("datagram truncated: sent {} of {} bytes", sent, len),
            )));
        }
        self.stats.bundles_sent += 1;
        self.stats.bytes_sent += sent as u64;
        log::trace!(
            "sent {} cell bundle ({} bytes) to {}",
            features.len(),
            sent,
            self.target
        );
        Ok(sent)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
