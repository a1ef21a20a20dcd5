//! Krishi Core — typed advisory flows for the Krishi farmer-advisory app.
//!
//! Each advisory task (crop suggestion, irrigation planning, yield
//! prediction, scheme lookup, market prices, plant diagnosis, farm assistant)
//! is a *flow*: an input schema, an output schema and a prompt template. The
//! executor validates the caller's input, renders the prompt (with any
//! uploaded photos or documents as media parts), calls the model service and
//! validates the structured reply before handing it back.
//!
//! This crate has **no HTTP framework dependency** by default, so it can be
//! used from:
//!
//! - the HTTP server (`krishi-server`)
//! - the CLI (`krishi-cli`)
//! - any other Rust caller, through the typed functions in [`advisory`]
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `FlowError` for use in axum handlers.

pub mod advisory;
pub mod config;
pub mod error;
pub mod flow;
pub mod model;
pub mod state;

// Convenience re-exports
pub use config::{ModelConfig, ModelProvider};
pub use error::{FlowError, InvocationError, InvocationErrorKind, ValidationError};
pub use flow::{FlowDefinition, FlowExecutor, FlowRegistry};
pub use model::{build_client, ModelClient, ModelRequest};
pub use state::{AppState, AppStateInner};
