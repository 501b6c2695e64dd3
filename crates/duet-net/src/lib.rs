//! Networking for duet.
//!
//! Production "glue" that wraps [`duet_core`]'s action-based session logic
//! with real I/O: tokio TCP sockets, a background session task and channels
//! towards the presentation layer.
//!
//! # Components
//!
//! - [`Transport`]: Bounded reads and whole-payload writes over one stream
//! - [`ConnectionEstablisher`]: Dial, or fall back to accepting one peer
//! - [`ChatSession`]: Runtime that executes [`duet_core::Session`] actions
//!
//! # Example
//!
//! ```no_run
//! use duet_core::Endpoint;
//! use duet_net::{ChatSession, SessionConfig};
//!
//! # async fn demo() -> Result<(), duet_net::EstablishError> {
//! let endpoint = Endpoint::loopback();
//! let mut session = ChatSession::start(SessionConfig::new("alice", endpoint, endpoint)).await?;
//!
//! session.submit_outgoing("hello");
//! while let Some(event) = session.next_event().await {
//!     println!("{}", event.text());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod establish;
mod session;
mod transport;

pub use error::{EstablishError, is_no_listener};
pub use establish::{ConnectionEstablisher, Establishment, PendingAccept};
pub use session::{ChatSession, SessionConfig, SessionStatus, WRITER_DRAIN_TIMEOUT};
pub use transport::{Transport, TransportReader, TransportWriter};
