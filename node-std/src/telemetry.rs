//! Telemetry export task: one best-effort UDP datagram per tick.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use envnode::protocol::{encode, TelemetryMessage};
use envnode::state::SharedEnvironmentState;

use crate::error::{NodeError, Result};
use crate::periodic::{PeriodicBody, StopSignal};

pub struct TelemetryTask {
    socket: Option<UdpSocket>,
    dest: SocketAddr,
    state: Arc<SharedEnvironmentState>,
    sent: u64,
    failed: u64,
}

impl TelemetryTask {
    pub fn new(dest: SocketAddr, state: Arc<SharedEnvironmentState>) -> Self {
        Self {
            socket: None,
            dest,
            state,
            sent: 0,
            failed: 0,
        }
    }

    #[cfg(test)]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    #[cfg(test)]
    pub fn failed(&self) -> u64 {
        self.failed
    }

    fn send(&self) -> Result<usize> {
        let msg = TelemetryMessage::from(self.state.reading());
        let payload = encode(&msg).ok_or(NodeError::Encode)?;
        let socket = self.socket.as_ref().ok_or_else(|| NodeError::TelemetrySend {
            dest: self.dest,
            source: io::Error::new(io::ErrorKind::NotConnected, "socket not open"),
        })?;
        socket
            .send_to(&payload, self.dest)
            .map_err(|source| NodeError::TelemetrySend {
                dest: self.dest,
                source,
            })
    }
}

impl PeriodicBody for TelemetryTask {
    fn init(&mut self, _stop: &StopSignal) -> Result<()> {
        let bind: SocketAddr = if self.dest.is_ipv6() {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).map_err(|e| NodeError::init("udp socket", e))?;
        log::info!("telemetry: sending to {}", self.dest);
        self.socket = Some(socket);
        Ok(())
    }

    fn run(&mut self) {
        match self.send() {
            Ok(len) => {
                self.sent += 1;
                log::trace!("telemetry: {len} bytes to {}", self.dest);
            }
            Err(e) => {
                self.failed += 1;
                log::warn!("{e}");
            }
        }
    }

    fn finish(&mut self) {
        log::info!(
            "telemetry: {} datagrams sent, {} failed",
            self.sent,
            self.failed
        );
        self.socket = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envnode::state::Reading;
    use std::time::Duration;

    fn receiver() -> UdpSocket {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        rx
    }

    #[test]
    fn sends_current_reading_as_one_datagram() {
        let rx = receiver();
        let state = Arc::new(SharedEnvironmentState::new());
        state.publish(Reading {
            motion: true,
            gas_ppm: 412.5,
            lux: 50.0,
        });

        let mut task = TelemetryTask::new(rx.local_addr().unwrap(), state);
        task.init(&StopSignal::new()).unwrap();
        task.run();

        let mut buf = [0u8; 256];
        let (len, _) = rx.recv_from(&mut buf).unwrap();
        let text = std::str::from_utf8(&buf[..len]).unwrap();
        assert!(text.contains("\"motion\":true"), "{text}");
        assert!(text.contains("\"gas\":412.5"), "{text}");
        assert!(text.contains("\"lux\":50"), "{text}");
        assert_eq!(task.sent(), 1);
        assert_eq!(task.failed(), 0);
    }

    #[test]
    fn each_tick_sends_latest_values() {
        let rx = receiver();
        let state = Arc::new(SharedEnvironmentState::new());
        let mut task = TelemetryTask::new(rx.local_addr().unwrap(), state.clone());
        task.init(&StopSignal::new()).unwrap();

        task.run();
        state.set_motion(true);
        task.run();

        let mut buf = [0u8; 256];
        let (len, _) = rx.recv_from(&mut buf).unwrap();
        assert!(std::str::from_utf8(&buf[..len]).unwrap().contains("\"motion\":false"));
        let (len, _) = rx.recv_from(&mut buf).unwrap();
        assert!(std::str::from_utf8(&buf[..len]).unwrap().contains("\"motion\":true"));
        assert_eq!(task.sent(), 2);
    }

    #[test]
    fn send_without_socket_is_counted_not_fatal() {
        let mut task = TelemetryTask::new(
            "127.0.0.1:5005".parse().unwrap(),
            Arc::new(SharedEnvironmentState::new()),
        );
        task.run();
        task.run();
        assert_eq!(task.failed(), 2);
        assert_eq!(task.sent(), 0);
    }
}
