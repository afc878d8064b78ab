//! A Rust re-implementation of the OpenVINO TFLite delegate's graph-translation and
//! lifecycle engine: the part of the delegate that decides which ops it can take over,
//! turns an assigned subgraph into a compiled target model, and drives synchronous
//! inference against it. See `SPEC_FULL.md` for the full design.

pub mod cache;
pub mod config;
pub mod delegate;
pub mod error;
pub mod ffi;
pub mod graph_builder;
pub mod host;
pub mod layout;
pub mod node_manager;
pub mod ops;
pub mod probe;
pub mod target;
pub mod types;

pub use delegate::Delegate;
pub use error::DelegateError;
