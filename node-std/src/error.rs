use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Node error taxonomy.
///
/// Only initialization failures are fatal, and only to the task that hit
/// them. Everything else is logged and the periodic cadence continues.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Driver or device setup failed (fatal to the owning task)
    #[error("{device} initialization failed: {source}")]
    Init {
        device: &'static str,
        #[source]
        source: io::Error,
    },

    /// Timer or execution-unit setup failed (fatal to the owning task)
    #[error("{task} timer setup failed: {source}")]
    Timer {
        task: &'static str,
        #[source]
        source: io::Error,
    },

    /// Bad read from a sensor; the caller substitutes a degenerate value
    #[error("{sensor} read failed: {source}")]
    Sensor {
        sensor: &'static str,
        #[source]
        source: io::Error,
    },

    /// Alert line write rejected
    #[error("alert line write failed: {0}")]
    Actuation(#[source] io::Error),

    /// Datagram could not be sent; no retry
    #[error("telemetry send to {dest} failed: {source}")]
    TelemetrySend {
        dest: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("telemetry payload did not fit the datagram buffer")]
    Encode,

    /// Stop was requested before the task reached its periodic phase
    #[error("{0} interrupted before start")]
    Interrupted(&'static str),
}

/// Result type alias for the node
pub type Result<T> = std::result::Result<T, NodeError>;

impl NodeError {
    pub fn init(device: &'static str, source: io::Error) -> Self {
        NodeError::Init { device, source }
    }

    pub fn sensor(sensor: &'static str, source: io::Error) -> Self {
        NodeError::Sensor { sensor, source }
    }

    /// True for failures that end the owning task.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NodeError::Init { .. } | NodeError::Timer { .. })
    }
}
