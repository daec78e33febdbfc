use crate::protocol::Value;

pub type ServiceName = String;
pub type MethodName = String;
pub type RpcArgs = Vec<Value>;

/// A single call, assembled fresh for every invocation.
///
/// The envelope is immutable once built; the codec renders it into a
/// `<methodCall>` document.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    service: ServiceName,
    method: MethodName,
    args: RpcArgs,
}

impl RequestEnvelope {
    pub fn new(service: impl Into<String>, method: impl Into<String>, args: RpcArgs) -> Self {
        RequestEnvelope {
            service: service.into(),
            method: method.into(),
            args,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Name written into `<methodName>`: `service.method`, or just `method`
    /// when the service is empty (the endpoint path already names it).
    pub fn method_name(&self) -> String {
        if self.service.is_empty() {
            self.method.clone()
        } else {
            format!("{}.{}", self.service, self.method)
        }
    }
}
