//! # taskpipe
//!
//! Bounded concurrent task pipeline. Raw input values (direct arguments or
//! a token stream) become work items through a caller-supplied factory,
//! are processed by a fixed pool of workers, and are handed to a reporter
//! as they complete, all under one deadline.
//!
//! ```no_run
//! use std::time::Duration;
//! use taskpipe::echo::EchoFactory;
//! use taskpipe::pipeline::{RunConfig, run_with_timeout};
//!
//! # async fn demo() -> taskpipe::error::Result<()> {
//! run_with_timeout(
//!     Duration::from_secs(3),
//!     EchoFactory::new(),
//!     4,
//!     RunConfig::new().args(["a", "b", "c"]),
//! )
//! .await
//! # }
//! ```

pub mod config;
pub mod echo;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod task;
pub mod telemetry;
