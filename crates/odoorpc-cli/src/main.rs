//! # odoorpc CLI Entry Point
//!
//! Main binary for talking to an Odoo backend over XML-RPC.
//!
//! ## Usage
//!
//! ```bash
//! # Raw call against any XML-RPC endpoint (outputs compact JSON)
//! odoorpc call http://127.0.0.1:8069/xmlrpc/2/common version
//!
//! # Server version
//! odoorpc version http://127.0.0.1:8069
//!
//! # Log in and print the user id
//! odoorpc login http://127.0.0.1:8069 -d demo -u admin --password admin
//!
//! # Search partners
//! ODOO_API_KEY=... odoorpc execute http://127.0.0.1:8069 -d demo -u admin \
//!   res.partner search_read -a '[[["is_company", "=", true]]]' -k '{"limit": 5}'
//! ```
//!
//! ## URL Format
//!
//! All URLs must include the `http://` or `https://` prefix.

use anyhow::Result;
use argh::FromArgs;
use odoorpc_cli::{
    parse_args_json, parse_kwargs_json, resolve_credential, retry_policy, to_json_string,
    validate_http_url,
};
use odoorpc_client::{RpcClient, Session, SessionConfig};
use std::time::Duration;

#[derive(FromArgs)]
/// odoorpc - XML-RPC client for Odoo
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Available CLI subcommands.
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Call(CallArgs),
    Version(VersionArgs),
    Login(LoginArgs),
    Execute(ExecuteArgs),
}

/// Arguments for making a single raw XML-RPC call.
///
/// Outputs the result as compact JSON on stdout so it can be piped to `jq`.
/// Errors go to stderr with a non-zero exit code.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a method on an XML-RPC endpoint
struct CallArgs {
    /// full endpoint URL, e.g. http://127.0.0.1:8069/xmlrpc/2/common
    #[argh(positional)]
    endpoint: String,

    /// method name
    #[argh(positional)]
    method: String,

    /// service prefix; the wire method becomes `service.method`
    #[argh(option, default = "String::new()")]
    service: String,

    /// JSON array of positional arguments (default `[]`)
    #[argh(option, short = 'a', long = "args", default = "\"[]\".into()")]
    args: String,

    /// timeout for each attempt in milliseconds
    #[argh(option, long = "timeout-ms", default = "30000")]
    timeout_ms: u64,

    /// total attempts for transient failures
    #[argh(option, long = "max-attempts", default = "3")]
    max_attempts: u32,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "version")]
/// print server version information
struct VersionArgs {
    /// base URL of the Odoo server
    #[argh(positional)]
    url: String,

    /// timeout for each attempt in milliseconds
    #[argh(option, long = "timeout-ms", default = "30000")]
    timeout_ms: u64,

    /// total attempts for transient failures
    #[argh(option, long = "max-attempts", default = "3")]
    max_attempts: u32,
}

/// Arguments for authenticating against a database.
///
/// The secret comes from `--password` or `--api-key`, falling back to the
/// `ODOO_PASSWORD` and `ODOO_API_KEY` environment variables.
#[derive(FromArgs)]
#[argh(subcommand, name = "login")]
/// authenticate and print the user id
struct LoginArgs {
    /// base URL of the Odoo server
    #[argh(positional)]
    url: String,

    /// database name
    #[argh(option, short = 'd')]
    database: String,

    /// login name
    #[argh(option, short = 'u')]
    username: String,

    /// password (or set ODOO_PASSWORD)
    #[argh(option)]
    password: Option<String>,

    /// API key (or set ODOO_API_KEY)
    #[argh(option, long = "api-key")]
    api_key: Option<String>,

    /// timeout for each attempt in milliseconds
    #[argh(option, long = "timeout-ms", default = "30000")]
    timeout_ms: u64,

    /// total attempts for transient failures
    #[argh(option, long = "max-attempts", default = "3")]
    max_attempts: u32,
}

/// Arguments for calling a model method through `execute_kw`.
///
/// Logs in first (with retries), then makes the call once.
#[derive(FromArgs)]
#[argh(subcommand, name = "execute")]
/// authenticate, then call a model method
struct ExecuteArgs {
    /// base URL of the Odoo server
    #[argh(positional)]
    url: String,

    /// model name, e.g. res.partner
    #[argh(positional)]
    model: String,

    /// model method, e.g. search_read
    #[argh(positional)]
    method: String,

    /// database name
    #[argh(option, short = 'd')]
    database: String,

    /// login name
    #[argh(option, short = 'u')]
    username: String,

    /// password (or set ODOO_PASSWORD)
    #[argh(option)]
    password: Option<String>,

    /// API key (or set ODOO_API_KEY)
    #[argh(option, long = "api-key")]
    api_key: Option<String>,

    /// JSON array of positional arguments (default `[]`)
    #[argh(option, short = 'a', long = "args", default = "\"[]\".into()")]
    args: String,

    /// JSON object of keyword arguments (default `{}`)
    #[argh(option, short = 'k', long = "kwargs", default = "\"{}\".into()")]
    kwargs: String,

    /// timeout for each attempt in milliseconds
    #[argh(option, long = "timeout-ms", default = "30000")]
    timeout_ms: u64,

    /// total login attempts for transient failures
    #[argh(option, long = "max-attempts", default = "3")]
    max_attempts: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // `call` keeps stdout and stderr clean for piping
    if !matches!(cli.command, Commands::Call(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Call(args) => run_call(args).await,
        Commands::Version(args) => run_version(args).await,
        Commands::Login(args) => run_login(args).await,
        Commands::Execute(args) => run_execute(args).await,
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Executes the `call` subcommand.
///
/// # Errors
///
/// Returns an error if the endpoint or args are invalid, or if the call
/// still fails after the allowed attempts.
async fn run_call(args: CallArgs) -> Result<()> {
    validate_http_url(&args.endpoint, "endpoint")?;
    let params = parse_args_json(&args.args)?;
    let retry = retry_policy(args.max_attempts)?;

    let client = RpcClient::with_timeout(&args.endpoint, Duration::from_millis(args.timeout_ms))?;
    let result = retry
        .run(|| client.call(args.service.as_str(), args.method.as_str(), params.clone()))
        .await?;

    println!("{}", to_json_string(result));
    Ok(())
}

async fn run_version(args: VersionArgs) -> Result<()> {
    validate_http_url(&args.url, "server URL")?;

    // Version needs no login; the credential is never sent
    let config = SessionConfig::new(
        &args.url,
        "",
        "",
        odoorpc_client::Credential::Password(String::new()),
    )
    .with_timeout(Duration::from_millis(args.timeout_ms));
    let session = Session::new(config)?.with_retry(retry_policy(args.max_attempts)?);

    tracing::info!("Fetching version from {}", args.url);
    let version = session.version().await?;

    println!("{}", to_json_string(version));
    Ok(())
}

async fn run_login(args: LoginArgs) -> Result<()> {
    validate_http_url(&args.url, "server URL")?;
    let credential = resolve_credential(args.password, args.api_key, env_var)?;

    let config = SessionConfig::new(&args.url, &args.database, &args.username, credential)
        .with_timeout(Duration::from_millis(args.timeout_ms));
    let mut session = Session::new(config)?.with_retry(retry_policy(args.max_attempts)?);

    let uid = session.authenticate().await?;

    println!("{}", uid);
    Ok(())
}

async fn run_execute(args: ExecuteArgs) -> Result<()> {
    validate_http_url(&args.url, "server URL")?;
    let credential = resolve_credential(args.password, args.api_key, env_var)?;
    let params = parse_args_json(&args.args)?;
    let kwargs = parse_kwargs_json(&args.kwargs)?;

    let config = SessionConfig::new(&args.url, &args.database, &args.username, credential)
        .with_timeout(Duration::from_millis(args.timeout_ms));
    let mut session = Session::new(config)?.with_retry(retry_policy(args.max_attempts)?);

    session.authenticate().await?;
    tracing::info!("Calling {}.{}", args.model, args.method);
    let result = session
        .execute_kw(&args.model, &args.method, params, kwargs)
        .await?;

    println!("{}", to_json_string(result));
    Ok(())
}
