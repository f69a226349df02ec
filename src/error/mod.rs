//! Error handling
//!
//! Defines error types and reporting for the remote file client.

pub mod handlers;
pub mod types;

pub use types::*;
