//! Population implementations that can be plugged into the epoch controller.

pub mod bitset;

pub use bitset::{Bits, BitsetParams, BitsetWorld, ParseBitsError};
