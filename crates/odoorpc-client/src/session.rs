//! Authentication session
//!
//! A [`Session`] owns two [`RpcClient`]s, one per backend endpoint:
//!
//! - `<url>/xmlrpc/2/common` for `version` and `authenticate`
//! - `<url>/xmlrpc/2/object` for `execute_kw`
//!
//! The endpoint path already names the service, so calls go out with an
//! empty service name and the bare method in `<methodName>`.

use odoorpc_common::protocol::error::{Result, RpcError};
use odoorpc_common::protocol::{Struct, Value};
use odoorpc_common::transport::DEFAULT_TIMEOUT;
use std::fmt;
use std::time::Duration;

use crate::client::RpcClient;
use crate::fields::FieldMapper;
use crate::model::Model;
use crate::retry::RetryPolicy;

pub const COMMON_PATH: &str = "/xmlrpc/2/common";
pub const OBJECT_PATH: &str = "/xmlrpc/2/object";

/// Secret used to log in
///
/// Both kinds travel in the same wire slot; which one the backend accepts
/// depends on its version and configuration.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    ApiKey(String),
}

impl Credential {
    pub fn secret(&self) -> &str {
        match self {
            Credential::Password(secret) | Credential::ApiKey(secret) => secret,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(***)"),
            Credential::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend base URL, e.g. `https://erp.example.com`
    pub url: String,
    pub database: String,
    pub username: String,
    pub credential: Credential,
    /// Timeout for each exchange
    pub timeout: Duration,
}

impl SessionConfig {
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            username: username.into(),
            credential,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn common_endpoint(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), COMMON_PATH)
    }

    pub fn object_endpoint(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), OBJECT_PATH)
    }
}

/// Logged-in (or not yet logged-in) connection to one database
pub struct Session {
    config: SessionConfig,
    common: RpcClient,
    object: RpcClient,
    retry: RetryPolicy,
    uid: Option<i64>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let common = RpcClient::with_timeout(config.common_endpoint(), config.timeout)?;
        let object = RpcClient::with_timeout(config.object_endpoint(), config.timeout)?;

        Ok(Self {
            config,
            common,
            object,
            retry: RetryPolicy::default(),
            uid: None,
        })
    }

    /// Replaces the policy used for `version` and `authenticate`.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn uid(&self) -> Option<i64> {
        self.uid
    }

    pub fn is_authenticated(&self) -> bool {
        self.uid.is_some()
    }

    pub fn common(&self) -> &RpcClient {
        &self.common
    }

    pub fn object(&self) -> &RpcClient {
        &self.object
    }

    /// Server version information, retried on transient failures
    pub async fn version(&self) -> Result<Value> {
        self.retry
            .run(|| self.common.call("", "version", vec![]))
            .await
    }

    /// Logs in and stores the user id, retried on transient failures
    ///
    /// # Errors
    ///
    /// `Authentication` when the backend answers with anything but a
    /// positive user id.
    pub async fn authenticate(&mut self) -> Result<i64> {
        let args = vec![
            Value::from(self.config.database.as_str()),
            Value::from(self.config.username.as_str()),
            Value::from(self.config.credential.secret()),
            Value::Struct(Struct::new()),
        ];

        let result = self
            .retry
            .run(|| self.common.call("", "authenticate", args.clone()))
            .await?;

        match result {
            Value::Int(uid) if uid > 0 => {
                tracing::info!(
                    database = %self.config.database,
                    username = %self.config.username,
                    uid,
                    "Authenticated"
                );
                self.uid = Some(uid);
                Ok(uid)
            }
            other => {
                tracing::debug!(result = ?other, "Authentication rejected");
                self.uid = None;
                Err(RpcError::authentication("Authentication failed"))
            }
        }
    }

    /// Calls `execute_kw` on the object endpoint
    ///
    /// Not retried: the method may not be idempotent. Wrap it in a
    /// [`RetryPolicy`] explicitly when it is.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Struct,
    ) -> Result<Value> {
        let uid = self
            .uid
            .ok_or_else(|| RpcError::authentication("Not authenticated"))?;

        let call_args = vec![
            Value::from(self.config.database.as_str()),
            Value::Int(uid),
            Value::from(self.config.credential.secret()),
            Value::from(model),
            Value::from(method),
            Value::Array(args),
            Value::Struct(kwargs),
        ];

        self.object.call("", "execute_kw", call_args).await
    }

    /// Record operations on `name`
    pub fn model(&self, name: impl Into<String>) -> Model<'_> {
        Model::new(self, name)
    }

    /// Fetches the field definitions of `model` for local record checks
    pub async fn field_mapper(&self, model: &str) -> Result<FieldMapper> {
        self.model(model).field_mapper().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}
