// Common utilities and shared types used across the application

pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at module root for convenience
pub use error::{FetchError, Result, ScraperError};
pub use types::{DateWindow, DrawRecord, DrawRow, Game, GameConfig, KnownDateSet};
