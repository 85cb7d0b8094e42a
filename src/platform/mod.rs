#![allow(non_snake_case, non_upper_case_globals)]
#![cfg_attr(debug_assertions, allow(dead_code))]

//! Engine generation identification. A closed `Games`-style enum (one
//! variant per title in a family of similar engines) narrowed down to the
//! two generations this crate needs, plus the marker-path scoring probe
//! the installation layer (`archive::install`) uses to tell them apart.

mod global;

pub use global::{Generation, KeyFileName, MarkerPaths, detectGeneration};
