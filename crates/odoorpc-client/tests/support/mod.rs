//! In-process XML-RPC test server
//!
//! Binds `127.0.0.1:0`, decodes each `<methodCall>` and hands it to the
//! handler together with the request path. Requests without a
//! `text/xml` content type are answered with `415`, and requests whose
//! `Content-Length` does not match the body with `411`, before reaching
//! the handler. The headers of every request are recorded.

#![allow(dead_code)]

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use odoorpc_common::transport::{MethodCall, XmlRpcCodec};
use odoorpc_common::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

type Handler = Arc<dyn Fn(&str, MethodCall) -> Response<Full<Bytes>> + Send + Sync>;
type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// What the server saw of one HTTP request
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub user_agent: Option<String>,
    pub body_len: usize,
}

pub struct TestXmlRpcServer {
    addr: String,
    requests: Recorded,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestXmlRpcServer {
    /// Starts a server on a random port
    pub async fn new<H>(handler: H) -> Self
    where
        H: Fn(&str, MethodCall) -> Response<Full<Bytes>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let requests: Recorded = Arc::default();
        let handler: Handler = Arc::new(handler);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();
        let server_requests = requests.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let handler = handler.clone();
                                let requests = server_requests.clone();

                                tokio::spawn(async move {
                                    let service = service_fn(move |req| {
                                        let handler = handler.clone();
                                        let requests = requests.clone();
                                        async move { serve(req, handler, requests).await }
                                    });

                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        eprintln!("Server error: {}", err);
                                    }
                                });
                            }
                            Err(err) => {
                                eprintln!("Accept error: {}", err);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Server answering every call with its params
    ///
    /// One param comes back bare, any other count as an array.
    pub async fn echo() -> Self {
        Self::new(|_, mut call| {
            let payload = if call.params.len() == 1 {
                call.params.remove(0)
            } else {
                Value::Array(call.params)
            };
            xml_response(&odoorpc_common::Response::success(payload))
        })
        .await
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Number of HTTP requests received so far
    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TestXmlRpcServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve(
    req: Request<Incoming>,
    handler: Handler,
    requests: Recorded,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut recorded = RecordedRequest {
        path: req.uri().path().to_string(),
        content_type: header(CONTENT_TYPE),
        content_length: header(CONTENT_LENGTH),
        user_agent: header(USER_AGENT),
        body_len: 0,
    };

    let body = req.into_body().collect().await?.to_bytes();
    recorded.body_len = body.len();
    requests.lock().unwrap().push(recorded.clone());

    let is_xml = recorded
        .content_type
        .as_deref()
        .is_some_and(|v| v.starts_with("text/xml"));
    let length_matches = recorded.content_length.as_deref() == Some(body.len().to_string().as_str());
    let path = recorded.path;

    if !length_matches {
        return Ok(raw_response(
            StatusCode::LENGTH_REQUIRED,
            "text/plain",
            "expected a Content-Length matching the body",
        ));
    }

    if !is_xml {
        return Ok(raw_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "text/plain",
            "expected text/xml",
        ));
    }

    match XmlRpcCodec::decode_request(&body) {
        Ok(call) => Ok((*handler)(&path, call)),
        Err(err) => Ok(raw_response(
            StatusCode::BAD_REQUEST,
            "text/plain",
            &err.to_string(),
        )),
    }
}

/// `200 OK` carrying an encoded `<methodResponse>`
pub fn xml_response(response: &odoorpc_common::Response) -> Response<Full<Bytes>> {
    raw_bytes(StatusCode::OK, "text/xml", XmlRpcCodec::encode_response(response))
}

pub fn success(payload: impl Into<Value>) -> Response<Full<Bytes>> {
    xml_response(&odoorpc_common::Response::success(payload.into()))
}

pub fn fault(code: i64, message: &str) -> Response<Full<Bytes>> {
    xml_response(&odoorpc_common::Response::fault(code, message))
}

pub fn raw_response(status: StatusCode, content_type: &str, body: &str) -> Response<Full<Bytes>> {
    raw_bytes(status, content_type, body.as_bytes().to_vec())
}

fn raw_bytes(status: StatusCode, content_type: &str, body: Vec<u8>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
