// src/exec/backend.rs

//! Pluggable execution backend abstraction.
//!
//! The coordinator talks to an `ExecutionBackend` instead of spawning
//! processes itself. This keeps the dispatch logic testable: integration
//! tests swap in a fake backend that records which commands were
//! dispatched and fabricates results, while production uses
//! [`LocalBackend`](super::LocalBackend) and
//! [`ContainerBackend`](super::ContainerBackend).

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::config::ExecutionPolicy;
use crate::model::{Command, ExecutionResult};

/// Trait abstracting how a single command is executed.
///
/// Implementations must be infallible at this boundary: anything that
/// goes wrong becomes a `Failure` or `Timeout` result.
pub trait ExecutionBackend: Send + Sync {
    /// Run the command under the given policy.
    ///
    /// `cancel` is the global run-cancellation token; a fired token must
    /// terminate the underlying process or container before returning.
    fn execute<'a>(
        &'a self,
        command: &'a Command,
        policy: &'a ExecutionPolicy,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>>;
}
