//! The Showdown question lifecycle engine.
//!
//! This crate contains everything between the durable store and the chat
//! adapter: posting questions, resolving answers under the once-only rule,
//! recovering in-flight questions after a restart, keeping the
//! content-provider token fresh, mirroring membership changes, and the
//! hourly maintenance sweep.
//!
//! Startup order matters: construct the [`Engine`], run
//! [`RecoveryCoordinator::recover_all`], then call
//! [`Engine::accept_questions`]. The engine rejects question creation until
//! then, so two renderings of the same logical question can never coexist.

pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod http;
pub mod maintenance;
pub mod membership;
pub mod recovery;
pub mod tokens;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use fetch::QuestionSource;
pub use http::HttpProvider;
pub use maintenance::MaintenanceHandle;
pub use membership::MembershipSync;
pub use recovery::{RecoveryCoordinator, RecoveryReport};
pub use tokens::{RefreshPolicy, TokenManager};

#[cfg(test)]
mod tests;
