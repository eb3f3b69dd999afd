pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ShopConfig;

pub use adapters::{InMemoryStore, JsonFileStore};
pub use crate::core::engine::{EngineSettings, SchedulingEngine};
pub use utils::error::{Result, SchedulingError};
