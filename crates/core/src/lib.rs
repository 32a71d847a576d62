//! Pondmarket Core - Shared types library.
//!
//! This crate provides common types used across all Pondmarket components:
//! - `bot` - Conversation engine and Strapi API clients
//! - `integration-tests` - End-to-end tests against a fake backend
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and the
//!   conversation state enum

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
