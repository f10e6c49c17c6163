//! # minnessyn-runtime
//!
//! The session layer of the minnessyn allocation tracker: sizing,
//! attach/detach lifecycle, the event surface host threads call from
//! their allocation paths, the viewer connection state machine and the
//! cooperative queue pump.
//!
//! ### Key Submodules:
//! - `session`: the explicit instrumentation context and its operations
//! - `connection`: Disconnected → Waiting → Connected → Draining → Closed
//! - `transport`: the byte-oriented viewer boundary the host implements

pub mod connection;
pub mod error;
pub mod session;
pub mod transport;

pub use connection::ConnectionState;
pub use error::RuntimeError;
pub use session::{min_required_memory, Session, SessionSlot, UNKNOWN_STRING_ID};
pub use transport::{MemTransport, Transport, TransportError};

pub use minnessyn_config::RuntimeConfig;
