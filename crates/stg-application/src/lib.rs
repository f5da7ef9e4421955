//! # Application Layer
//!
//! Use cases and orchestration for the Security Testing Gateway: the
//! per-connection mission context, the HTTP executor, the best-effort
//! logging pipeline, and the entity services backing the tool surface.
//!
//! This layer depends only on `stg-domain` ports; concrete providers are
//! injected at bootstrap.
#![allow(missing_docs)]

/// HTTP execution orchestration
pub mod executor;
/// Best-effort request logging and target auto-attribution
pub mod logging_pipeline;
/// Per-connection active mission state
pub mod mission_context;
/// Header redaction and body truncation policies
pub mod redaction;
/// Entity services backing the tool surface
pub mod services;
/// Repository aggregate
pub mod store;

pub use executor::{AuthSpec, HttpExecutor, RequestSpec, ResponseEnvelope};
pub use logging_pipeline::{LogReport, RequestLogger};
pub use mission_context::{MissionContext, MissionContextSnapshot};
pub use redaction::{BodyLimits, RedactionPolicy, TruncatedBody, truncate_body};
pub use store::Store;
