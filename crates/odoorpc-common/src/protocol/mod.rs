pub mod error;
pub mod requests;
pub mod responses;
pub mod value;


pub use error::{ErrorKind, Result, RpcError};
pub use requests::{MethodName, RequestEnvelope, RpcArgs, ServiceName};
pub use responses::Response;
pub use value::{Struct, Value};
