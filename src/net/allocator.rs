//! Private port allocation.
//!
//! # Responsibilities
//! - Pick a candidate port just past the highest port known to be in use
//! - Sweep the configured range once, modulo its size
//! - Treat "address in use" as a lost race and move on
//! - Abort on any other bind failure

use std::collections::BTreeSet;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;

use thiserror::Error;

use crate::rules::PortRange;

/// Errors raised while claiming a port.
#[derive(Debug, Error)]
pub enum AllocError {
    /// Bind failed for a reason other than the port being taken.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Every port in the range was taken.
    #[error("found no available port in range {range} after {attempts} attempts")]
    PortExhausted { range: PortRange, attempts: u32 },
}

/// Binds listening sockets.
pub trait PortBinder: Send + Sync {
    fn bind(&self, port: u16) -> io::Result<TcpListener>;
}

/// Binds `0.0.0.0:<port>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpBinder;

impl PortBinder for TcpBinder {
    fn bind(&self, port: u16) -> io::Result<TcpListener> {
        TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }
}

/// A claimed port and the socket holding it.
#[derive(Debug)]
pub struct Allocation {
    pub port: u16,
    pub listener: TcpListener,
    /// Candidates examined, including the successful one.
    pub attempts: u32,
}

/// Allocates ports from a fixed range.
pub struct PortAllocator {
    range: PortRange,
    binder: Arc<dyn PortBinder>,
}

impl PortAllocator {
    pub fn new(range: PortRange, binder: Arc<dyn PortBinder>) -> Self {
        Self { range, binder }
    }

    /// Claim a port not present in `in_use`.
    ///
    /// Ports in `in_use` still route traffic to a live rule and are skipped
    /// without binding. Ports bound by someone we don't know about (a sibling
    /// racing us, a lingering socket) surface as `AddrInUse` and are skipped
    /// too. Starting past the highest known port keeps us clear of the ports
    /// about to be cleaned up.
    pub fn allocate(&self, in_use: &BTreeSet<u16>) -> Result<Allocation, AllocError> {
        let span = self.range.len();
        let start = in_use
            .last()
            .map(|max| u32::from(*max) + 1)
            .unwrap_or(u32::from(self.range.min));

        let mut attempts = 0;
        for step in 0..span {
            attempts += 1;
            let port = self.candidate(start, step);

            if in_use.contains(&port) {
                continue;
            }

            match self.binder.bind(port) {
                Ok(listener) => {
                    return Ok(Allocation { port, listener, attempts });
                }
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    tracing::debug!(port, "Port already bound, trying next");
                }
                Err(source) => return Err(AllocError::Bind { port, source }),
            }
        }

        Err(AllocError::PortExhausted { range: self.range, attempts })
    }

    /// The `step`-th candidate after `start`, wrapped into the range.
    fn candidate(&self, start: u32, step: u32) -> u16 {
        let min = i64::from(self.range.min);
        let span = i64::from(self.range.len());
        let offset = (i64::from(start) + i64::from(step) - min).rem_euclid(span);
        // offset < span, so min + offset <= max
        (min + offset) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Binds ephemeral ports on loopback while pretending to bind the
    /// requested one, so tests never depend on which real ports are free.
    struct FakeBinder {
        taken: BTreeSet<u16>,
        fail_with: Option<io::ErrorKind>,
        calls: Mutex<Vec<u16>>,
    }

    impl FakeBinder {
        fn new(taken: &[u16]) -> Self {
            Self {
                taken: taken.iter().copied().collect(),
                fail_with: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<u16> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PortBinder for FakeBinder {
        fn bind(&self, port: u16) -> io::Result<TcpListener> {
            self.calls.lock().unwrap().push(port);
            if let Some(kind) = self.fail_with {
                return Err(io::Error::from(kind));
            }
            if self.taken.contains(&port) {
                return Err(io::Error::from(io::ErrorKind::AddrInUse));
            }
            TcpListener::bind("127.0.0.1:0")
        }
    }

    fn allocator(min: u16, max: u16, binder: &Arc<FakeBinder>) -> PortAllocator {
        let binder: Arc<dyn PortBinder> = binder.clone();
        PortAllocator::new(PortRange::new(min, max), binder)
    }

    fn ports(list: &[u16]) -> BTreeSet<u16> {
        list.iter().copied().collect()
    }

    #[test]
    fn starts_after_highest_port_in_use() {
        let binder = Arc::new(FakeBinder::new(&[]));
        let alloc = allocator(40400, 40409, &binder).allocate(&ports(&[40400, 40401])).unwrap();

        assert_eq!(alloc.port, 40402);
        assert_eq!(alloc.attempts, 1);
    }

    #[test]
    fn starts_at_range_minimum_when_nothing_in_use() {
        let binder = Arc::new(FakeBinder::new(&[]));
        let alloc = allocator(40400, 40409, &binder).allocate(&BTreeSet::new()).unwrap();
        assert_eq!(alloc.port, 40400);
    }

    #[test]
    fn skips_ports_bound_elsewhere() {
        let binder = Arc::new(FakeBinder::new(&[40402, 40403]));
        let alloc = allocator(40400, 40409, &binder).allocate(&ports(&[40401])).unwrap();

        assert_eq!(alloc.port, 40404);
        assert_eq!(binder.calls(), vec![40402, 40403, 40404]);
        assert_eq!(alloc.attempts, 3);
    }

    #[test]
    fn wraps_around_the_range() {
        let binder = Arc::new(FakeBinder::new(&[]));
        let alloc = allocator(40400, 40409, &binder).allocate(&ports(&[40409])).unwrap();
        assert_eq!(alloc.port, 40400);
    }

    #[test]
    fn ports_outside_range_wrap_in() {
        let binder = Arc::new(FakeBinder::new(&[]));
        let alloc = allocator(40400, 40409, &binder).allocate(&ports(&[65535])).unwrap();
        assert!((40400..=40409).contains(&alloc.port));
    }

    #[test]
    fn never_binds_a_port_in_use() {
        let binder = Arc::new(FakeBinder::new(&[]));
        let alloc = allocator(40400, 40402, &binder).allocate(&ports(&[40400, 40402])).unwrap();

        assert_eq!(alloc.port, 40401);
        assert_eq!(binder.calls(), vec![40401]);
    }

    #[test]
    fn exhausts_after_one_sweep() {
        let binder = Arc::new(FakeBinder::new(&[40400]));
        let err = allocator(40400, 40400, &binder).allocate(&ports(&[40400])).unwrap_err();

        match err {
            AllocError::PortExhausted { range, attempts } => {
                assert_eq!(range, PortRange::new(40400, 40400));
                assert_eq!(attempts, 1);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn exhausts_when_every_bind_collides() {
        let binder = Arc::new(FakeBinder::new(&[40400, 40401, 40402]));
        let err = allocator(40400, 40402, &binder).allocate(&BTreeSet::new()).unwrap_err();

        assert!(matches!(err, AllocError::PortExhausted { attempts: 3, .. }));
        assert_eq!(binder.calls().len(), 3);
    }

    #[test]
    fn other_bind_errors_abort_immediately() {
        let mut binder = FakeBinder::new(&[]);
        binder.fail_with = Some(io::ErrorKind::PermissionDenied);
        let binder = Arc::new(binder);

        let err = allocator(40400, 40409, &binder).allocate(&BTreeSet::new()).unwrap_err();
        assert!(matches!(err, AllocError::Bind { port: 40400, .. }));
        assert_eq!(binder.calls().len(), 1);
    }
}
