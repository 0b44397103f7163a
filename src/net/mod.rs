//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Rules currently installed (ports in use)
//!     → allocator.rs (sweep the private range, bind the first free port)
//!     → std::net::TcpListener handed to the caller
//!     → caller serves on it (e.g. tokio::net::TcpListener::from_std)
//! ```
//!
//! # Design Decisions
//! - Binding is the lock: the kernel guarantees two processes cannot hold
//!   the same port, so racing siblings resolve through `AddrInUse`
//! - One full sweep of the range at most
//! - The binder is injectable so allocation logic is testable without
//!   touching real ports

pub mod allocator;

pub use allocator::{AllocError, Allocation, PortAllocator, PortBinder, TcpBinder};
