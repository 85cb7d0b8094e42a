#![allow(non_snake_case, non_upper_case_globals)]

//! Core resource addressing, archive I/O, script toolchain, and binary model
//! rewriter for the Odyssey/Aurora engine family.
//!
//! This crate is the shared foundation for per-record parsers, GUI editors,
//! diff/patch tooling, and CLI front ends. None of those live here; this
//! crate only reads and writes the byte-level containers and formats they
//! all depend on.

mod bits;
mod bytes;

pub mod context;
pub mod error;

pub mod resource;
pub mod archive;
pub mod script;
pub mod model;
pub mod platform;

pub use context::Context;
pub use error::{Error, Result};
