use crate::protocol::error::RpcError;
use crate::protocol::Value;

/// Decoded `<methodResponse>`
///
/// Exactly one of the two outcomes is populated. A success with exactly one
/// `<param>` carries the bare value; any other count carries a
/// [`Value::Array`] of all params in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Value),
    Fault { code: i64, message: String },
}

impl Response {
    pub fn success(payload: Value) -> Self {
        Response::Success(payload)
    }

    pub fn fault(code: i64, message: impl Into<String>) -> Self {
        Response::Fault {
            code,
            message: message.into(),
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Response::Fault { .. })
    }

    /// Turns a fault into its classified error.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self {
            Response::Success(payload) => Ok(payload),
            Response::Fault { code, message } => Err(RpcError::from_fault(code, message)),
        }
    }
}
