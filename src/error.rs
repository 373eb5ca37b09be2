//! Error types for taskpipe.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("error reading input stream: {0}")]
    StreamRead(#[source] std::io::Error),

    #[error("job timed out: {}", describe_deadline(.timeout))]
    DeadlineExceeded { timeout: Option<Duration> },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The run missed its deadline.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Error::DeadlineExceeded { .. })
    }

    /// The token source failed while being read.
    pub fn is_stream_read(&self) -> bool {
        matches!(self, Error::StreamRead(_))
    }
}

fn describe_deadline(timeout: &Option<Duration>) -> String {
    match timeout {
        Some(t) => format!("deadline of {t:?} exceeded"),
        None => "deadline exceeded".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
