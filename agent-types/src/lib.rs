#![doc = include_str!("../README.md")]

pub mod types;
pub mod traits;
pub mod error;
pub mod wasm;
pub mod stream;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use wasm::*;
pub use stream::*;
