//! Port allocation for the embedded server.
//!
//! Candidates are drawn at random from the full 16-bit range and probed with
//! a short TCP connect. A port whose connect is refused or times out is
//! considered free; any other outcome counts as taken. Nothing reserves the port between the probe and the server's bind,
//! so another process can still grab it in that window.

use rand::Rng;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, trace};

use tempdb_core::{Result, TempDbConfig, TempDbError};

/// Lowest unprivileged port; smaller candidates are shifted up by this much.
pub const UNPRIVILEGED_OFFSET: u16 = 1024;

/// Decides whether a local port is already taken.
#[cfg_attr(test, mockall::automock)]
pub trait PortProbe: Send + Sync {
    fn is_occupied(&self, port: u16) -> bool;
}

/// Probes ports by connecting to `127.0.0.1:<port>` with a short timeout.
#[derive(Debug, Clone, Copy)]
pub struct TcpPortProbe {
    timeout: Duration,
}

impl TcpPortProbe {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PortProbe for TcpPortProbe {
    fn is_occupied(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        match TcpStream::connect_timeout(&addr, self.timeout) {
            Ok(_stream) => true,
            Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::TimedOut) => {
                trace!(port = %port, error = %e, "Nobody listening");
                false
            }
            Err(e) => {
                // Inconclusive, so never hand this port out.
                debug!(port = %port, error = %e, "Port check failed, treating port as taken");
                true
            }
        }
    }
}

/// Picks unused local ports by random probing.
#[derive(Debug, Clone)]
pub struct PortAllocator<P = TcpPortProbe> {
    probe: P,
    max_attempts: u32,
}

impl PortAllocator<TcpPortProbe> {
    /// Allocator using the attempt budget and probe timeout from `config`.
    pub const fn from_config(config: &TempDbConfig) -> Self {
        Self::new(
            TcpPortProbe::new(config.probe_timeout()),
            config.max_port_attempts,
        )
    }
}

impl<P: PortProbe> PortAllocator<P> {
    pub const fn new(probe: P, max_attempts: u32) -> Self {
        Self {
            probe,
            max_attempts,
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pick a port nobody answers on.
    ///
    /// Every occupied candidate consumes one attempt; after `max_attempts`
    /// occupied candidates allocation fails with `AllocationExhausted`.
    pub fn pick_port(&self) -> Result<u16> {
        let mut rng = rand::thread_rng();

        for attempt in 1..=self.max_attempts {
            let port = remap_privileged(rng.gen_range(0..=u16::MAX));

            if self.probe.is_occupied(port) {
                debug!(port = %port, attempt = %attempt, "Port in use, retrying");
                continue;
            }

            debug!(port = %port, attempt = %attempt, "Picked unused port");
            return Ok(port);
        }

        Err(TempDbError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Shift privileged candidates into the unprivileged range.
pub const fn remap_privileged(port: u16) -> u16 {
    if port < UNPRIVILEGED_OFFSET {
        port + UNPRIVILEGED_OFFSET
    } else {
        port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn privileged_candidates_are_shifted_not_redrawn() {
        assert_eq!(remap_privileged(0), 1024);
        assert_eq!(remap_privileged(80), 1104);
        assert_eq!(remap_privileged(1023), 2047);
        assert_eq!(remap_privileged(1024), 1024);
        assert_eq!(remap_privileged(u16::MAX), u16::MAX);
    }

    #[test]
    fn exhaustion_after_exactly_max_attempts() {
        let mut probe = MockPortProbe::new();
        probe
            .expect_is_occupied()
            .withf(|port| *port >= UNPRIVILEGED_OFFSET)
            .times(10)
            .returning(|_| true);

        let allocator = PortAllocator::new(probe, 10);
        let err = allocator.pick_port().unwrap_err();
        assert!(matches!(
            err,
            TempDbError::AllocationExhausted { attempts: 10 }
        ));
    }

    #[test]
    fn returns_first_free_candidate() {
        let mut probe = MockPortProbe::new();
        let mut calls = 0;
        probe.expect_is_occupied().times(3).returning(move |_| {
            calls += 1;
            calls < 3
        });

        let allocator = PortAllocator::new(probe, 10);
        let port = allocator.pick_port().unwrap();
        assert!(port >= UNPRIVILEGED_OFFSET);
    }

    #[test]
    fn tcp_probe_sees_listening_socket() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpPortProbe::new(Duration::from_millis(100));
        assert!(probe.is_occupied(port));
    }

    #[test]
    fn failed_check_counts_as_taken() {
        // A zero timeout makes every connect fail with InvalidInput
        let probe = TcpPortProbe::new(Duration::ZERO);
        assert!(probe.is_occupied(40000));

        let allocator = PortAllocator::new(probe, 3);
        assert!(matches!(
            allocator.pick_port(),
            Err(TempDbError::AllocationExhausted { attempts: 3 })
        ));
    }

    #[test]
    fn picked_port_refuses_connections() {
        let allocator = PortAllocator::from_config(&TempDbConfig::default());
        let port = allocator.pick_port().unwrap();

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        assert!(TcpStream::connect_timeout(&addr, Duration::from_millis(100)).is_err());
    }
}
