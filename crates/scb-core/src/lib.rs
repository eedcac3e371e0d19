//! Core domain and application logic for the site-cleaner bot.
//!
//! Nothing here depends on Telegram. The chat platform sits behind the
//! [`messaging::port::MessagingPort`] and [`ports::FileFetcher`] traits,
//! implemented in the adapter crate.

pub mod aggregator;
pub mod artifact;
pub mod audit;
pub mod cards;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod session;
pub mod suffix;
pub mod urls;

pub use errors::{Error, Result};
