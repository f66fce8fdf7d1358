#![doc = include_str!("../README.md")]

pub mod middleware;
pub mod registry;
pub mod builtin;

pub use middleware::*;
pub use registry::*;
pub use builtin::*;

#[cfg(feature = "macros")]
pub use agent_tool_macros::agent_tool;
