#![allow(non_snake_case, non_upper_case_globals)]
#![cfg_attr(debug_assertions, allow(dead_code))]

//! Archive I/O: keyed archives (KEY/BIF/BZF), capsules (ERF/RIM), and the
//! installation lookup layer that merges them (§4.2–§4.4).

pub mod bif;
pub mod capsule;
pub mod erf;
pub mod install;
pub mod key;
pub mod rim;

pub use capsule::{CapsuleIndex, CapsuleResource};
pub use erf::Erf;
pub use install::Installation;
pub use key::Key;
pub use rim::Rim;
