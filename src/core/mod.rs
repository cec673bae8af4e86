//! Core types, errors and the verification engine.

pub mod engine;
pub mod error;
pub mod hash;
pub mod time;
pub mod types;
