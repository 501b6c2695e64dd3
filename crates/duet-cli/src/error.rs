//! Front-end errors.

use std::io;

use duet_core::EndpointError;
use duet_net::EstablishError;
use thiserror::Error;

/// Errors that end the front-end.
#[derive(Debug, Error)]
pub enum CliError {
    /// Address or port on the command line could not be parsed.
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    /// Neither dialing nor listening succeeded.
    #[error("could not start session: {0}")]
    Establish(#[from] EstablishError),

    /// Reading input or writing the transcript failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
