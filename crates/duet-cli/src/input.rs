//! Input line handling.
//!
//! Lines are read on a dedicated OS thread and handed over through a channel.
//! A blocking read there never holds up the tokio runtime: when the session
//! ends the runtime shuts down and the process exits even though the thread
//! is still parked in `read`.

use std::{
    io::{self, BufRead},
    thread,
};

use tokio::sync::mpsc;

/// Lines buffered between the reader thread and the runtime.
const LINE_BUFFER: usize = 64;

/// Command that quits the session.
pub const QUIT_COMMAND: &str = "/quit";

/// What a line of user input asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    /// Send the line as a chat message.
    Message(&'a str),
    /// Disconnect and exit.
    Quit,
    /// Whitespace only; nothing to do.
    Blank,
}

impl<'a> Input<'a> {
    /// Classify one line (without its line terminator).
    ///
    /// Message text is passed through untouched; only the quit command is
    /// matched after trimming.
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Self::Blank
        } else if trimmed == QUIT_COMMAND {
            Self::Quit
        } else {
            Self::Message(line)
        }
    }
}

/// Stream of input lines, ending when the input does.
pub type LineReceiver = mpsc::Receiver<io::Result<String>>;

/// Read `reader` line by line on a background thread.
///
/// The thread stops at end of input, after the first read error, or once
/// the receiver is dropped and another line arrives.
pub fn spawn_line_reader<R>(reader: R) -> io::Result<LineReceiver>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);

    // Detached: a read parked on an interactive terminal is never joined
    let _detached = thread::Builder::new().name("duet-input".to_string()).spawn(move || {
        for line in reader.lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
        tracing::debug!("Input reader finished");
    })?;

    Ok(rx)
}

/// Lines from the process's standard input.
pub fn stdin_lines() -> io::Result<LineReceiver> {
    spawn_line_reader(io::BufReader::new(io::stdin()))
}
