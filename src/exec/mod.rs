// src/exec/mod.rs

//! Command execution layer.
//!
//! A backend runs exactly one command under a timeout and always produces
//! an [`ExecutionResult`](crate::model::ExecutionResult). Failures of any
//! kind (spawn errors, unreachable container runtime, timeouts,
//! cancellation) are converted into results and never surface as `Err`.
//!
//! - [`backend`] defines the `ExecutionBackend` trait.
//! - [`local`] runs commands as shell subprocesses.
//! - [`container`] runs commands in ephemeral Docker containers.

pub mod backend;
pub mod container;
pub mod local;

pub use backend::ExecutionBackend;
pub use container::ContainerBackend;
pub use local::LocalBackend;
