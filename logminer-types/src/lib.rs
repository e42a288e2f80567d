pub mod models;
pub mod offset;
pub mod types;

// Re-exports
pub use bincode;
pub use chrono;
pub use indexmap;
pub use log;
pub use ordered_float;
pub use rust_decimal;
pub use serde;
pub use serde_yaml;
pub use thiserror;
