//! odoorpc Common Types and Transport
//!
//! This crate provides the protocol definitions, the XML-RPC wire codec and
//! the HTTP transport shared by the odoorpc client and CLI.
//!
//! # Overview
//!
//! - **Protocol Layer**: [`Value`], [`RequestEnvelope`], [`Response`] and the
//!   [`RpcError`] taxonomy
//! - **Transport Layer**: [`XmlRpcCodec`](transport::XmlRpcCodec) and
//!   [`HttpTransport`](transport::HttpTransport)
//!
//! # Wire protocol
//!
//! - **Transport**: HTTP(S) POST, `Content-Type: text/xml`
//! - **Method name**: `<service>.<method>` (bare method when service is empty)
//! - **Arguments**: one `<param>` per positional argument
//!
//! # Example
//!
//! ```
//! use odoorpc_common::{RequestEnvelope, Value};
//! use odoorpc_common::transport::XmlRpcCodec;
//!
//! let request = RequestEnvelope::new("common", "version", vec![]);
//! let body = XmlRpcCodec::encode_request(&request);
//! assert!(String::from_utf8(body).unwrap().contains("<methodName>common.version</methodName>"));
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
