//! Session and Model Integration Tests
//!
//! A fake backend serves `/xmlrpc/2/common` and `/xmlrpc/2/object` with
//! just enough behaviour to check login, `execute_kw` framing and the
//! record operations built on it.

mod support;

use hyper::body::Bytes;
use hyper::Response;
use http_body_util::Full;
use odoorpc_client::{
    term, Credential, RetryConfig, RetryPolicy, SearchOptions, Session, SessionConfig,
};
use odoorpc_common::transport::MethodCall;
use odoorpc_common::{ErrorKind, Struct, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use support::{fault, success, TestXmlRpcServer};

const DATABASE: &str = "demo";
const USERNAME: &str = "admin";
const PASSWORD: &str = "secret";
const API_KEY: &str = "0123456789abcdef";
const UID: i64 = 2;

fn record(members: &[(&str, Value)]) -> Value {
    Value::Struct(
        members
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

fn accepted_secret(secret: &Value) -> bool {
    matches!(secret.as_str(), Some(PASSWORD) | Some(API_KEY))
}

fn fake_odoo(path: &str, call: MethodCall) -> Response<Full<Bytes>> {
    let params = call.params;
    match (path, call.method_name.as_str()) {
        ("/xmlrpc/2/common", "version") => success(record(&[
            ("server_version", Value::from("17.0")),
            ("protocol_version", Value::Int(1)),
        ])),
        ("/xmlrpc/2/common", "authenticate") => {
            let ok = params.len() == 4
                && params[0].as_str() == Some(DATABASE)
                && params[1].as_str() == Some(USERNAME)
                && accepted_secret(&params[2]);
            if ok {
                success(UID)
            } else {
                success(false)
            }
        }
        ("/xmlrpc/2/object", "execute_kw") => execute_kw(params),
        (_, method) => fault(4, &format!("Method not found: {method}")),
    }
}

fn execute_kw(params: Vec<Value>) -> Response<Full<Bytes>> {
    if params.len() != 7 {
        return fault(4, "execute_kw expects 7 arguments");
    }
    if params[1].as_i64() != Some(UID) || !accepted_secret(&params[2]) {
        return fault(2, "Access Denied");
    }

    let model = params[3].as_str().unwrap_or_default();
    let method = params[4].as_str().unwrap_or_default();
    let args = params[5].as_array().unwrap_or_default();
    let kwargs = params[6].clone();

    if model != "res.partner" {
        return fault(4, &format!("Object {model} doesn't exist"));
    }

    match method {
        "create" => success(42),
        "read" => {
            let ids = args[0].as_array().unwrap_or_default();
            success(Value::Array(
                ids.iter()
                    .map(|id| record(&[("id", id.clone()), ("name", Value::from("Partner"))]))
                    .collect(),
            ))
        }
        "write" | "unlink" => success(true),
        "search" => {
            let limit = kwargs.get("limit").and_then(Value::as_i64).unwrap_or(3);
            success(Value::Array((1..=limit.min(3)).map(Value::Int).collect()))
        }
        "search_count" => success(3),
        // Echo the call shape so tests can inspect it
        "search_read" => success(Value::Array(vec![record(&[
            ("domain", args[0].clone()),
            ("kwargs", kwargs),
        ])])),
        "fields_get" => success(record(&[
            (
                "name",
                record(&[("type", Value::from("char")), ("required", Value::Bool(true))]),
            ),
            (
                "display_name",
                record(&[("type", Value::from("char")), ("readonly", Value::Bool(true))]),
            ),
            ("kwargs", kwargs),
        ])),
        "action_archive" => success(record(&[
            ("args", Value::Array(args.to_vec())),
            ("kwargs", kwargs),
        ])),
        "check_access_rights" => fault(3, "You are not allowed\nto do this"),
        _ => fault(4, &format!("Method {method} not found")),
    }
}

fn config(server: &TestXmlRpcServer, credential: Credential) -> SessionConfig {
    SessionConfig::new(server.base_url(), DATABASE, USERNAME, credential)
}

async fn logged_in(server: &TestXmlRpcServer) -> Session {
    let mut session = Session::new(config(server, Credential::Password(PASSWORD.into()))).unwrap();
    session.authenticate().await.unwrap();
    session
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_version() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = Session::new(config(&server, Credential::Password(PASSWORD.into()))).unwrap();

    let version = session.version().await.unwrap();

    assert_eq!(version.get("server_version"), Some(&Value::from("17.0")));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_authenticate_with_password() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let mut session = Session::new(config(&server, Credential::Password(PASSWORD.into()))).unwrap();

    let uid = session.authenticate().await.unwrap();

    assert_eq!(uid, UID);
    assert_eq!(session.uid(), Some(UID));
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_authenticate_with_api_key() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let mut session = Session::new(config(&server, Credential::ApiKey(API_KEY.into()))).unwrap();

    assert_eq!(session.authenticate().await.unwrap(), UID);
}

#[tokio::test]
async fn test_rejected_login_is_authentication_error() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let mut session = Session::new(config(&server, Credential::Password("wrong".into()))).unwrap();

    let err = session.authenticate().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.to_string(), "Authentication failed");
    assert!(!session.is_authenticated());
    // `false` is an answer, not a transient failure
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_authenticate_retries_transient_fault() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server_calls = calls.clone();
    let server = TestXmlRpcServer::new(move |path, call| {
        if server_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            fault(1, "database is starting")
        } else {
            fake_odoo(path, call)
        }
    })
    .await;

    let retry = RetryPolicy::new(RetryConfig::new(3, 10, 100, 2.0).unwrap());
    let mut session = Session::new(config(&server, Credential::Password(PASSWORD.into())))
        .unwrap()
        .with_retry(retry);

    assert_eq!(session.authenticate().await.unwrap(), UID);
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_execute_kw_before_login_sends_nothing() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = Session::new(config(&server, Credential::Password(PASSWORD.into()))).unwrap();

    let err = session
        .execute_kw("res.partner", "search", vec![Value::Array(vec![])], Struct::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn test_execute_kw_is_not_retried() {
    let server = TestXmlRpcServer::new(|path, call| {
        if call.method_name == "execute_kw" {
            fault(1, "could not serialize access")
        } else {
            fake_odoo(path, call)
        }
    })
    .await;
    let session = logged_in(&server).await;

    let err = session
        .execute_kw("res.partner", "create", vec![], Struct::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    // one authenticate plus one execute_kw
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_execute_kw_fault_is_classified() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = logged_in(&server).await;

    let err = session
        .execute_kw("res.partner", "check_access_rights", vec![], Struct::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.validation_errors(), ["You are not allowed", "to do this"]);
}

// ============================================================================
// Model Tests
// ============================================================================

#[tokio::test]
async fn test_model_crud() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = logged_in(&server).await;
    let partners = session.model("res.partner");

    let mut values = Struct::new();
    values.insert("name".to_string(), Value::from("Acme"));

    assert_eq!(partners.create(values.clone()).await.unwrap(), 42);
    assert!(partners.write(&[42], values).await.unwrap());
    assert!(partners.unlink(&[42]).await.unwrap());

    let records = partners.read(&[7, 8], &["name"]).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].get("id"), Some(&Value::Int(8)));
}

#[tokio::test]
async fn test_model_search_and_count() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = logged_in(&server).await;
    let partners = session.model("res.partner");
    let domain = vec![term("is_company", "=", true)];

    let all = partners.search(domain.clone(), &SearchOptions::default()).await.unwrap();
    let limited = partners
        .search(domain.clone(), &SearchOptions::default().limit(2))
        .await
        .unwrap();

    assert_eq!(all, vec![1, 2, 3]);
    assert_eq!(limited, vec![1, 2]);
    assert_eq!(partners.search_count(domain).await.unwrap(), 3);
}

#[tokio::test]
async fn test_search_read_passes_kwargs() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = logged_in(&server).await;

    let rows = session
        .model("res.partner")
        .search_read(
            vec![term("name", "ilike", "acme")],
            &["name", "email"],
            &SearchOptions::default().offset(5).limit(10).order("name desc"),
        )
        .await
        .unwrap();

    let kwargs = rows[0].get("kwargs").unwrap();
    assert_eq!(kwargs.get("offset"), Some(&Value::Int(5)));
    assert_eq!(kwargs.get("limit"), Some(&Value::Int(10)));
    assert_eq!(kwargs.get("order"), Some(&Value::from("name desc")));
    assert_eq!(
        kwargs.get("fields"),
        Some(&Value::from(vec!["name", "email"]))
    );
    assert_eq!(
        rows[0].get("domain"),
        Some(&Value::Array(vec![term("name", "ilike", "acme")]))
    );
}

#[tokio::test]
async fn test_fields_get() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = logged_in(&server).await;

    let fields = session
        .model("res.partner")
        .fields_get(&["type"])
        .await
        .unwrap();

    assert_eq!(fields["name"].get("type"), Some(&Value::from("char")));
    assert_eq!(
        fields["kwargs"].get("attributes"),
        Some(&Value::from(vec!["type"]))
    );
}

#[tokio::test]
async fn test_model_call_forwards_args_and_kwargs() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = logged_in(&server).await;

    let mut kwargs = Struct::new();
    kwargs.insert("context".to_string(), record(&[("lang", Value::from("en_US"))]));

    let echoed = session
        .model("res.partner")
        .call("action_archive", vec![Value::from(vec![7, 8])], kwargs)
        .await
        .unwrap();

    assert_eq!(
        echoed.get("args"),
        Some(&Value::Array(vec![Value::from(vec![7, 8])]))
    );
    assert_eq!(
        echoed.get("kwargs").and_then(|k| k.get("context")),
        Some(&record(&[("lang", Value::from("en_US"))]))
    );
}

#[tokio::test]
async fn test_session_field_mapper() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = logged_in(&server).await;

    let mapper = session.field_mapper("res.partner").await.unwrap();

    assert_eq!(mapper.required_fields(), vec!["name"]);
    assert_eq!(mapper.readonly_fields(), vec!["display_name"]);

    let mut values = Struct::new();
    values.insert("name".to_string(), Value::from("Acme"));
    assert!(mapper.validate_record(&values).is_ok());

    values.insert("display_name".to_string(), Value::from("Acme Corp"));
    values.insert("name".to_string(), Value::Nil);
    let err = mapper.validate_record(&values).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        err.validation_errors(),
        ["Field display_name is readonly", "Field name is required"]
    );
}

#[tokio::test]
async fn test_unknown_model_fault() {
    let server = TestXmlRpcServer::new(fake_odoo).await;
    let session = logged_in(&server).await;

    let err = session.model("no.such.model").search_count(vec![]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Generic);
    assert_eq!(err.fault_code(), Some(4));
}

#[tokio::test]
async fn test_unexpected_result_shape_is_generic_error() {
    let server = TestXmlRpcServer::new(|path, call| {
        if call.method_name == "execute_kw" {
            success("not a number")
        } else {
            fake_odoo(path, call)
        }
    })
    .await;
    let session = logged_in(&server).await;

    let err = session.model("res.partner").search_count(vec![]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Generic);
    assert_eq!(err.fault_code(), None);
}
