//! Database models split into domain-specific modules.

pub mod account;
pub mod asset;
pub mod common;
pub mod plant;

pub use account::*;
pub use asset::*;
pub use common::*;
pub use plant::*;
