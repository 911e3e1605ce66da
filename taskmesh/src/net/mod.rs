//! Transport layer: non-blocking streams, the awaitable socket adapter, and
//! the timed-accept listener.
//!
//! The core consumes an abstract byte stream ([`NonBlockingStream`]) with
//! classifiable, POSIX-like error semantics. [`TcpBackend`] is the default
//! implementation over `std::net::TcpStream`; overlay-network transports
//! plug in behind the same trait.

mod adapter;
mod blocking;
mod error;
mod stream;

pub use adapter::SocketAdapter;
pub use blocking::BlockingTcp;
pub use error::{NetError, TryStatus};
pub use stream::{NonBlockingStream, TcpAcceptor, TcpBackend};
