//! Token sources: lazily-read streams of raw input values.
//!
//! Only consulted when a run has no direct input sequence. [`Lines`] is the
//! default (one token per line of stdin); [`Words`] splits on whitespace
//! instead; [`IterSource`] wraps an in-memory iterator.

use std::collections::VecDeque;
use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

/// A lazy sequence of string tokens.
#[async_trait]
pub trait TokenSource: Send {
    /// Read the next token. `Ok(None)` means the source is exhausted.
    ///
    /// # Errors
    /// Returns the underlying I/O error if the source fails mid-read.
    async fn next_token(&mut self) -> io::Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

/// One token per line. Line terminators (`\n` or `\r\n`) are stripped.
pub struct Lines<R> {
    lines: tokio::io::Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> Lines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl Lines<BufReader<Stdin>> {
    /// Lines of the process's standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> TokenSource for Lines<R> {
    async fn next_token(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}

// ---------------------------------------------------------------------------
// Words
// ---------------------------------------------------------------------------

/// One token per whitespace-separated word. Blank lines yield nothing.
pub struct Words<R> {
    lines: tokio::io::Lines<R>,
    pending: VecDeque<String>,
}

impl<R: AsyncBufRead + Unpin + Send> Words<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            pending: VecDeque::new(),
        }
    }
}

impl Words<BufReader<Stdin>> {
    /// Words of the process's standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> TokenSource for Words<R> {
    async fn next_token(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(word) = self.pending.pop_front() {
                return Ok(Some(word));
            }
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Adapts an iterator of read results into a token source.
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = io::Result<String>> + Send,
{
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }
}

#[async_trait]
impl<I> TokenSource for IterSource<I>
where
    I: Iterator<Item = io::Result<String>> + Send,
{
    async fn next_token(&mut self) -> io::Result<Option<String>> {
        self.iter.next().transpose()
    }
}
