//! Umbrella crate for World of Bits.
//!
//! This crate is intentionally small: it re-exports the engine and protocol crates
//! so downstream code can depend on a single crate name (`worldofbits`).

pub use worldofbits_engine as engine;
pub use worldofbits_protocol as protocol;
