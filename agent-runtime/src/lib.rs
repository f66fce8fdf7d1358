#![doc = include_str!("../README.md")]

pub mod session;
pub mod sub_agent;
pub mod guardrail;
pub mod durable;
pub mod sandbox;
pub mod history;

pub use session::*;
pub use sub_agent::*;
pub use guardrail::*;
pub use durable::*;
pub use sandbox::*;
pub use history::{history_file_path, load_history, repair_history, save_history};
