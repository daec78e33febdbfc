//! odoorpc Transport Layer
//!
//! This module provides the XML-RPC wire codec and the HTTP exchange that
//! carries it.
//!
//! # Architecture
//!
//! - **Codec**: [`XmlRpcCodec`] renders envelopes into `<methodCall>`
//!   documents and decodes `<methodResponse>` documents (pure, no I/O)
//! - **Transport**: [`HttpTransport`] POSTs one document with
//!   `Content-Type: text/xml` and returns the decoded [`Response`](crate::protocol::Response)
//!
//! # Example
//!
//! ```no_run
//! use odoorpc_common::transport::{HttpTransport, DEFAULT_TIMEOUT};
//! use odoorpc_common::protocol::{RequestEnvelope, Value};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new("http://127.0.0.1:8069/xmlrpc/2/common", DEFAULT_TIMEOUT)?;
//! let request = RequestEnvelope::new("", "version", vec![]);
//! let payload = transport.exchange(&request).await?.into_result()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod http;

pub use codec::{MethodCall, XmlRpcCodec};
pub use http::{HttpTransport, DEFAULT_TIMEOUT};
