//! Command Line Interface for the dynamic synonym filter.

pub mod args;
pub mod commands;

// Re-export commonly used types
pub use args::*;
pub use commands::*;
