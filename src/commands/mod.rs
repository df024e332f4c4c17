//! CLI commands implementation

pub mod collections;
pub mod init;
pub mod query;
pub mod stats;
pub mod sweep;

pub use collections::*;
pub use init::*;
pub use query::*;
pub use stats::*;
pub use sweep::*;
