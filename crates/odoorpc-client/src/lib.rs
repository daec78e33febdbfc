pub mod client;
pub mod fields;
pub mod model;
pub mod retry;
pub mod session;

pub use client::RpcClient;
pub use fields::FieldMapper;
pub use model::{term, Model, SearchOptions};
pub use retry::{RetryConfig, RetryOptions, RetryPolicy, RetryPredicate};
pub use session::{Credential, Session, SessionConfig};
