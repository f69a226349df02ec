//! Remote tree navigation
//!
//! Path helpers and the recursive mkdir / recursive listing algorithms that
//! both protocol clients share.

pub mod operations;
pub mod paths;

pub use operations::{RemoteOps, mkdir_recursive, walk_files};
