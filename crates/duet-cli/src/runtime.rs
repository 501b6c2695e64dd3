//! Front-end event loop.
//!
//! Races input lines against session events with `tokio::select!`. Input
//! ends the session on `/quit` or end-of-input; the loop itself ends when the
//! session's event stream does, so the final disconnect line is always
//! written before [`Runtime::run`] returns.

use chrono::Local;
use duet_core::{ChatEvent, DisconnectReason};
use duet_net::{ChatSession, SessionConfig};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{
    error::CliError,
    input::{Input, LineReceiver},
    transcript::format_line,
};

/// Connects a stream of input lines and a transcript stream to one chat
/// session.
pub struct Runtime<O> {
    session: ChatSession,
    input: LineReceiver,
    output: O,
}

impl<O> Runtime<O>
where
    O: AsyncWrite + Unpin,
{
    /// Start the session. Returns once connected as a client or listening.
    pub async fn start(
        config: SessionConfig,
        input: LineReceiver,
        output: O,
    ) -> Result<Self, CliError> {
        let session = ChatSession::start(config).await?;
        Ok(Self { session, input, output })
    }

    /// Run until the session has disconnected and every event is written.
    ///
    /// Returns why the session ended, or `None` if it ended without a
    /// disconnect event.
    pub async fn run(mut self) -> Result<Option<DisconnectReason>, CliError> {
        let mut input_open = true;
        let mut ended = None;

        loop {
            tokio::select! {
                event = self.session.next_event() => match event {
                    Some(event) => {
                        self.write_event(&event).await?;
                        if let ChatEvent::Disconnected { reason, .. } = event {
                            ended = Some(reason);
                        }
                    },
                    None => break,
                },

                line = self.input.recv(), if input_open => match line.transpose()? {
                    Some(line) => self.handle_line(&line),
                    None => {
                        tracing::debug!("Input closed, disconnecting");
                        input_open = false;
                        self.session.request_disconnect();
                    },
                },
            }
        }

        self.output.flush().await?;
        self.session.closed().await;
        Ok(ended)
    }

    fn handle_line(&self, line: &str) {
        match Input::parse(line) {
            Input::Message(text) => self.session.submit_outgoing(text),
            Input::Quit => {
                tracing::info!("Quit requested");
                self.session.request_disconnect();
            },
            Input::Blank => {},
        }
    }

    async fn write_event(&mut self, event: &ChatEvent) -> Result<(), CliError> {
        let mut line = format_line(event, Local::now().naive_local());
        line.push('\n');

        self.output.write_all(line.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}
