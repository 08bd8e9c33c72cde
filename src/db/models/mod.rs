//! Database models split into domain-specific modules.

pub mod chat;
pub mod class;
pub mod stats;
pub mod user;

pub use chat::*;
pub use class::*;
pub use stats::*;
pub use user::*;
