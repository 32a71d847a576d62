//! Core types for Pondmarket.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod state;

pub use id::*;
pub use price::{Price, PriceError};
pub use state::{ChatState, StateParseError};
