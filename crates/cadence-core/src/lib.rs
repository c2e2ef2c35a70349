//! cadence-core: Adaptive difficulty and spaced-repetition scheduling.
//!
//! This crate defines the data model, collaborator traits, scoring functions,
//! the difficulty profile controller, the SM-2 scheduler, performance
//! analysis, challenge selection, and the attempt processor that ties them
//! together.

pub mod analyzer;
pub mod error;
pub mod locks;
pub mod model;
pub mod parser;
pub mod processor;
pub mod profile;
pub mod scheduler;
pub mod scoring;
pub mod selector;
pub mod statistics;
pub mod sweep;
pub mod traits;

pub use error::{EngineError, ValidationError};
pub use processor::{AttemptInput, AttemptProcessor, EngineConfig, ProcessingResult};
