//! Core types and trait definitions for the Showdown trivia engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod error;
pub mod ids;
pub mod membership;
pub mod presenter;
pub mod provider;
pub mod question;
pub mod store;
pub mod token;

pub use error::{Error, Result};
