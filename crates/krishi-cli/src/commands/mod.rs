//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses the
//! krishi-core flow registry and executor.

pub mod flows;
pub mod server;

use krishi_core::FlowRegistry;

/// Same registry the server builds: built-ins plus `flows_dir`, or plus the
/// default flow directories when no directory is given.
pub fn load_registry(flows_dir: Option<&str>) -> Result<FlowRegistry, String> {
    krishi_server::build_registry(flows_dir)
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
