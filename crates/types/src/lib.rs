/// Shared types for the LP cycler
///
/// This crate provides common type definitions, constants, and the shared
/// error type used across the math and keeper crates.

pub mod action;
pub mod constants;
pub mod errors;
pub mod ids;
pub mod pool;
pub mod position;

// Re-export all public types
pub use action::*;
pub use constants::*;
pub use errors::*;
pub use ids::*;
pub use pool::*;
pub use position::*;

/// Result type alias using the shared error type
pub type CyclerResult<T> = std::result::Result<T, CyclerError>;
