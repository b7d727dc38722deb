//! # Types
//!
//! Small value types shared by the symbol and memory layers.

pub mod address;

pub use address::Address;
