//! Pondmarket Bot - conversational storefront over a Strapi commerce backend.
//!
//! # Architecture
//!
//! - Inbound chat events flow through the [`dispatcher`], which spawns one
//!   task per event and hands it to the [`engine`]
//! - The engine loads the conversation's session, dispatches on its state,
//!   calls the [`strapi`] catalog/cart clients as needed, and persists the
//!   next state only after the handler succeeds
//! - Sessions live behind the [`session::SessionStore`] trait (file-backed in
//!   production, in-memory in tests)
//! - The chat transport is abstract ([`transport::ChatTransport`]); the
//!   bundled implementation talks to the Telegram Bot API over plain HTTP
//!
//! The Strapi backend is treated as a black box: an authenticated HTTP
//! gateway plus a typed decoding layer, with no business logic in transport
//! code.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod session;
pub mod strapi;
mod sync;
pub mod transport;

pub use config::BotConfig;
pub use error::BotError;
