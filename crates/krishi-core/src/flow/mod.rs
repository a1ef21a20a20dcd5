//! Flow layer — schema-bound prompt tasks executed against a generative model.
//!
//! # Architecture
//!
//! ```text
//! flows/*.yaml ──► FlowDefinition ──► FlowRegistry (Arc, read-only)
//!                   │  ObjectSchema (input / output)         │
//!                   │  Template                              ▼
//!                   └──────────────────────────────► FlowExecutor
//!                                                            │
//!                                                      ModelClient
//!                                                            │
//!                                              Gemini / Anthropic / OpenAI
//! ```

pub mod definition;
pub mod executor;
pub mod media;
pub mod registry;
pub mod schema;
pub mod template;

pub use definition::{FlowDefinition, FlowSpec};
pub use executor::{ExecutionState, FlowExecutor};
pub use media::MediaReference;
pub use registry::FlowRegistry;
pub use schema::{FieldDef, FieldKind, ObjectSchema};
pub use template::{RenderedRequest, RequestPart, Template};
