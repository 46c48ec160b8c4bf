//! Tool-call gateway for the mnemo memory engine
//!
//! Exposes the eight memory tools over newline-delimited JSON-RPC 2.0 on
//! stdin/stdout. Logging goes to stderr so stdout stays protocol-clean.
//!
//! - [`rpc`]: JSON-RPC message types and error codes
//! - [`validate`]: boundary validation applied before the engine is called
//! - [`tools`]: tool catalog (JSON schemas) and dispatch
//! - [`gateway`]: the stdio read-dispatch-respond loop

pub mod gateway;
pub mod rpc;
pub mod tools;
pub mod validate;
