use odoorpc_common::protocol::error::Result;
use odoorpc_common::protocol::{RequestEnvelope, Response, Value};
use odoorpc_common::transport::{HttpTransport, DEFAULT_TIMEOUT};
use std::time::Duration;

/// XML-RPC client bound to one endpoint URL
///
/// Stateless beyond the endpoint and timeout: every call builds a fresh
/// envelope and performs one exchange over a fresh connection, so clones can
/// be used from many tasks at once.
#[derive(Debug, Clone)]
pub struct RpcClient {
    transport: HttpTransport,
}

impl RpcClient {
    /// Create a client for `endpoint` with the default 30 second timeout
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create a client for `endpoint` with a custom exchange timeout
    pub fn with_timeout(endpoint: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let transport = HttpTransport::new(endpoint.as_ref(), timeout)?;
        Ok(Self { transport })
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint().to_string()
    }

    pub fn timeout(&self) -> Duration {
        self.transport.timeout()
    }

    /// Call `service.method` with positional `args`
    ///
    /// Faults come back as classified errors; see
    /// [`RpcError`](odoorpc_common::RpcError).
    pub async fn call(
        &self,
        service: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<Value> {
        self.call_raw(service, method, args).await?.into_result()
    }

    /// Like [`call`](Self::call) but hands back faults unclassified
    pub async fn call_raw(
        &self,
        service: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<Response> {
        let request = RequestEnvelope::new(service, method, args);
        self.transport.exchange(&request).await
    }
}
