//! cadence-store: Concrete collaborators for the cadence engine.
//!
//! Provides an in-memory, versioned repository with JSON snapshots, a
//! template-based content generator, and TOML configuration loading.

pub mod config;
pub mod error;
pub mod memory;
pub mod template;

pub use config::{load_config_from, CadenceConfig};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use template::TemplateContentGenerator;
