//! Core protocol logic for duet, a two-party TCP text chat.
//!
//! Sans-IO: nothing in this crate opens sockets or spawns tasks. The
//! [`Session`] state machine receives inputs (connection progress, payloads,
//! stream failures, local submissions) and returns [`SessionAction`]s for a
//! driver to execute. `duet-net` is the production driver.
//!
//! # Components
//!
//! - [`Session`]: Handshake and message-loop state machine
//! - [`ChatEvent`]: Events produced for the presentation layer
//! - [`Endpoint`]: Validated address/port pair
//! - [`wire`]: Payload encoding

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod endpoint;
pub mod error;
pub mod event;
pub mod session;
pub mod wire;

pub use endpoint::{DEFAULT_PORT, Endpoint};
pub use error::{EndpointError, SessionError};
pub use event::{ChatEvent, ChatEventKind, DisconnectReason};
pub use session::{Role, Session, SessionAction, SessionState};
pub use wire::DEFAULT_READ_CHUNK_SIZE;
