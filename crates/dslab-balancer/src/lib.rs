#![doc = include_str!("../readme.md")]

pub mod context;
pub mod core;
pub mod extensions;
pub mod log;
pub mod simulation;

pub use colored;
