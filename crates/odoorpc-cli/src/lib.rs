// Copyright 2026 odoorpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # odoorpc CLI
//!
//! Command-line front end for the odoorpc client.
//!
//! The binary parses arguments with `argh` and hands the pieces defined here
//! to `odoorpc-client`:
//!
//! - JSON argument parsing into wire [`Value`]s
//! - Credential resolution from flags or the environment
//! - Retry policy construction from `--max-attempts`
//!
//! ## Key Commands
//!
//! - `odoorpc call`: one raw XML-RPC call (outputs JSON for scripting)
//! - `odoorpc version`: server version info
//! - `odoorpc login`: authenticate and print the user id
//! - `odoorpc execute`: authenticate, then `execute_kw` on a model

use anyhow::{anyhow, bail, Context, Result};
use odoorpc_client::{Credential, RetryOptions, RetryPolicy};
use odoorpc_common::{Struct, Value};

/// Environment variable read when neither `--password` nor `--api-key` is given
pub const PASSWORD_ENV: &str = "ODOO_PASSWORD";
/// Environment variable read when neither `--password` nor `--api-key` is given
pub const API_KEY_ENV: &str = "ODOO_API_KEY";

/// Validates that a URL string starts with http:// or https://
///
/// # Errors
///
/// Returns an error naming `description` if the prefix is missing.
pub fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!(
            "Invalid {}: '{}' must start with http:// or https://",
            description,
            url
        ))
    }
}

/// Parses a JSON array into positional arguments
pub fn parse_args_json(json: &str) -> Result<Vec<Value>> {
    let parsed: serde_json::Value =
        serde_json::from_str(json).context("Invalid JSON in args")?;
    match Value::from(parsed) {
        Value::Array(items) => Ok(items),
        _ => bail!("args must be a JSON array, e.g. '[1, \"two\"]'"),
    }
}

/// Parses a JSON object into keyword arguments
pub fn parse_kwargs_json(json: &str) -> Result<Struct> {
    let parsed: serde_json::Value =
        serde_json::from_str(json).context("Invalid JSON in kwargs")?;
    match Value::from(parsed) {
        Value::Struct(members) => Ok(members),
        _ => bail!("kwargs must be a JSON object, e.g. '{{\"limit\": 5}}'"),
    }
}

/// Picks the login secret
///
/// Priority: `--password` > `--api-key` flag > `ODOO_PASSWORD` > `ODOO_API_KEY`.
/// `env` is the variable lookup, normally `std::env::var(..).ok()`.
pub fn resolve_credential(
    password: Option<String>,
    api_key: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Credential> {
    match (password, api_key) {
        (Some(_), Some(_)) => bail!("Use either --password or --api-key, not both"),
        (Some(password), None) => Ok(Credential::Password(password)),
        (None, Some(key)) => Ok(Credential::ApiKey(key)),
        (None, None) => env(PASSWORD_ENV)
            .map(Credential::Password)
            .or_else(|| env(API_KEY_ENV).map(Credential::ApiKey))
            .ok_or_else(|| {
                anyhow!(
                    "No credential given: pass --password or --api-key, or set {} or {}",
                    PASSWORD_ENV,
                    API_KEY_ENV
                )
            }),
    }
}

/// Default backoff with the attempt count overridden
pub fn retry_policy(max_attempts: u32) -> Result<RetryPolicy> {
    let policy = RetryPolicy::default().with_options(&RetryOptions {
        max_attempts: Some(max_attempts),
        ..Default::default()
    });
    policy.config().validate()?;
    Ok(policy)
}

/// Renders a result as compact JSON
pub fn to_json_string(value: Value) -> String {
    serde_json::Value::from(value).to_string()
}
