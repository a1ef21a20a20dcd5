//! Transport-agnostic JSON-RPC 2.0 layer over the flow executor.
//!
//! Decoupled from axum so the same dispatcher can serve HTTP (`/api/rpc`),
//! stdio, or an embedding application.
//!
//! # Example
//!
//! ```ignore
//! use krishi_server::rpc::RpcRouter;
//!
//! let router = RpcRouter::new(app_state);
//! let response = router.handle_request(r#"{
//!     "jsonrpc": "2.0",
//!     "id": 1,
//!     "method": "flows.run",
//!     "params": { "name": "getMarketPrice", "input": { "productName": "Onion", "location": "Nashik" } }
//! }"#).await;
//! ```

pub mod error;
pub mod methods;
pub mod router;
pub mod types;

pub use error::RpcError;
pub use router::RpcRouter;
pub use types::{JsonRpcRequest, JsonRpcResponse};
