// src/config/mod.rs

//! Engine configuration.
//!
//! [`loader`] assembles one immutable [`EngineConfig`] from CLI arguments
//! and the on-disk config files; [`container`] models the container
//! policy file and its pattern resolution.

pub mod container;
pub mod loader;

pub use container::{Backend, ContainerConfig, ContainerEntry, ExecutionPolicy};
pub use loader::EngineConfig;
