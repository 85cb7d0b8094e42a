#![allow(non_snake_case, non_upper_case_globals)]
#![cfg_attr(debug_assertions, allow(dead_code))]

//! Resource addressing: identity, the closed resource-type table, lazy
//! resource records, and case-insensitive path resolution (§3, §4.1).

pub mod identity;
pub mod path;
pub mod record;
pub mod restype;

pub use identity::Identity;
pub use record::{ResourceRecord, SourceDescriptor};
pub use restype::ResourceType;
