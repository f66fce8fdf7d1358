#![doc = include_str!("../README.md")]

pub mod config;
pub mod loop_impl;
pub mod step;

pub use config::*;
pub use loop_impl::*;
pub use step::*;
