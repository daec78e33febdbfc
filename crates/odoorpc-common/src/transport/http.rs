//! HTTP Transport Exchange
//!
//! One XML-RPC round trip over HTTP(S): POST the request document, read the
//! whole body, decode it. The deadline covers connect, send and receive.
//!
//! # Failure mapping
//!
//! - Connect/send/receive errors and the deadline → `Connection`
//! - Non-2xx status with a body that is not XML-RPC → `Connection`
//! - 2xx with a body that is not XML-RPC → `Parse`
//! - `<fault>` → `Ok(Response::Fault { .. })`; classification happens one
//!   layer up
//!
//! No retries happen here.
//!
//! # Example
//!
//! ```no_run
//! use odoorpc_common::transport::HttpTransport;
//! use odoorpc_common::protocol::{RequestEnvelope, Value};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new("http://127.0.0.1:8069/xmlrpc/2/common", Duration::from_secs(30))?;
//! let request = RequestEnvelope::new("", "version", vec![]);
//! let response = transport.exchange(&request).await?;
//! # Ok(())
//! # }
//! ```

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use crate::protocol::error::{Result, RpcError};
use crate::protocol::{RequestEnvelope, Response};
use crate::transport::codec::XmlRpcCodec;

/// Default deadline for one exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT_VALUE: &str = concat!("odoorpc/", env!("CARGO_PKG_VERSION"));

type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// HTTP(S) transport bound to one XML-RPC endpoint
///
/// Cloning is cheap; clones share the underlying hyper client. Idle
/// connections are not kept, so every exchange opens its own connection.
#[derive(Clone)]
pub struct HttpTransport {
    endpoint: Uri,
    timeout: Duration,
    client: HttpClient,
}

impl HttpTransport {
    /// Creates a transport for `endpoint`
    ///
    /// # Errors
    ///
    /// Returns a `Generic` error if the URL is not a valid `http://` or
    /// `https://` URI.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint: Uri = endpoint
            .parse()
            .map_err(|e| RpcError::generic(format!("Invalid endpoint URL '{endpoint}'")).with_source(e))?;

        match endpoint.scheme_str() {
            Some("http") | Some("https") => {}
            _ => {
                return Err(RpcError::generic(format!(
                    "Invalid endpoint URL '{endpoint}': must start with http:// or https://"
                )))
            }
        }

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Ok(Self {
            endpoint,
            timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Performs exactly one request/response round trip
    ///
    /// # Returns
    ///
    /// - `Ok(Response::Success(..))` - Decoded params
    /// - `Ok(Response::Fault { .. })` - The backend answered with a fault
    /// - `Err(..)` - Connection or parse failure
    pub async fn exchange(&self, request: &RequestEnvelope) -> Result<Response> {
        let body = XmlRpcCodec::encode_request(request);

        tracing::debug!(
            endpoint = %self.endpoint,
            method = %request.method_name(),
            bytes = body.len(),
            "Sending XML-RPC request"
        );

        let (status, payload) = tokio::time::timeout(self.timeout, self.round_trip(body))
            .await
            .map_err(|_| RpcError::timeout(self.timeout))??;

        tracing::debug!(
            endpoint = %self.endpoint,
            status = status.as_u16(),
            bytes = payload.len(),
            "Received XML-RPC response"
        );

        match XmlRpcCodec::decode_response(&payload) {
            Ok(response) => Ok(response),
            Err(e) if !status.is_success() => Err(RpcError::connection(format!(
                "HTTP {} from {}",
                status, self.endpoint
            ))
            .with_source(e)),
            Err(e) => Err(e),
        }
    }

    async fn round_trip(&self, body: Vec<u8>) -> Result<(hyper::StatusCode, Bytes)> {
        let http_request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "text/xml")
            .header(CONTENT_LENGTH, body.len())
            .header(USER_AGENT, USER_AGENT_VALUE)
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| RpcError::generic("Failed to build request").with_source(e))?;

        let response = self
            .client
            .request(http_request)
            .await
            .map_err(|e| RpcError::from_transport(format!("HTTP request failed: {e}"), e))?;

        let status = response.status();
        let payload = response
            .into_body()
            .collect()
            .await
            .map_err(|e| RpcError::from_transport(format!("Failed to read response: {e}"), e))?
            .to_bytes();

        Ok((status, payload))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}
