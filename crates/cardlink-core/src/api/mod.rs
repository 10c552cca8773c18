//! API implementation submodules.
//!
//! Each submodule contains `impl CardlinkApi` blocks for one flow. The struct
//! definition remains in `lib.rs`.

mod builder;
mod linking;
mod registration;
mod status;

pub use builder::CardlinkApiBuilder;
