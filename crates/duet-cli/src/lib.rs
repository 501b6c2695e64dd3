//! Terminal front-end for duet.
//!
//! A thin shell over [`duet_net::ChatSession`]: lines from an input stream
//! become outgoing messages, chat events become timestamped transcript lines
//! on an output stream. Session logic lives in `duet-core` and `duet-net`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
pub mod input;
pub mod runtime;
pub mod transcript;

pub use error::CliError;
pub use input::{Input, LineReceiver, spawn_line_reader, stdin_lines};
pub use runtime::Runtime;
pub use transcript::{TIMESTAMP_FORMAT, format_line};
