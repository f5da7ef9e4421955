//! # Infrastructure Layer
//!
//! Configuration loading, XDG path resolution, the cookie profile store,
//! prompt guide documents and tracing initialisation for the Security
//! Testing Gateway.
#![allow(missing_docs)]

/// Application configuration (TOML file + `STG_` env overrides)
pub mod config;
/// Cookie profile store: YAML registry, TTL cache, permission checks
pub mod cookies;
/// Tracing initialisation
pub mod logging;
/// Prompt guide documents (user directory over built-ins)
pub mod prompts;

pub use config::{AppConfig, paths};
pub use cookies::CookieProfileStore;
pub use prompts::{PromptFormat, PromptLibrary};
