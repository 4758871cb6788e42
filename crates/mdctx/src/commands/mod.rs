//! Command implementations.

pub mod analyze;
pub mod info;
pub mod models;
pub mod process;
pub mod tokens;
