use anyhow::Result;
use hyper::{body::to_bytes, Body};
use kube::{error::ErrorResponse, Client};
use serde::Serialize;

pub type ApiServerHandle = tower_test::mock::Handle<http::Request<Body>, http::Response<Body>>;

/// Create a kube client backed by a mocked API server.
pub fn mock_client() -> (Client, ApiServerHandle) {
    let (mock_service, handle) =
        tower_test::mock::pair::<http::Request<Body>, http::Response<Body>>();
    (Client::new(mock_service, "default"), handle)
}

pub async fn timeout_after_1s<T>(handle: tokio::task::JoinHandle<T>) -> T {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("stub succeeded")
}

/// A request received by the mocked API server.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub content_type: String,
    pub body: serde_json::Value,
}

impl Request {
    pub async fn from_request(request: http::Request<Body>) -> Result<Self> {
        let method = request.method().to_string();
        let path = request.uri().path().to_owned();
        let content_type = request
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let body_bytes = to_bytes(request.into_body()).await?;
        let body = if body_bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body_bytes).expect("body should be JSON")
        };
        Ok(Self {
            method,
            path,
            content_type,
            body,
        })
    }

    /// Method and path, e.g. `PATCH /api/v1/namespaces/loadgen`.
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// The request body rendered for expect tests.
    pub fn pretty_body(&self) -> String {
        serde_json::to_string_pretty(&self.body).expect("body should serialize")
    }
}

pub fn json_response(value: &impl Serialize) -> http::Response<Body> {
    http::Response::builder()
        .body(Body::from(serde_json::to_vec(value).unwrap()))
        .unwrap()
}

pub fn not_found() -> http::Response<Body> {
    let error = ErrorResponse {
        status: "Failure".to_owned(),
        code: 404,
        message: "stub message".to_owned(),
        reason: "NotFound".to_owned(),
    };
    http::Response::builder()
        .status(404)
        .body(Body::from(serde_json::to_vec(&error).unwrap()))
        .unwrap()
}

/// Serve exactly `count` requests with `respond`, returning what was received.
pub fn serve<F>(
    mut handle: ApiServerHandle,
    count: usize,
    respond: F,
) -> tokio::task::JoinHandle<Vec<Request>>
where
    F: Fn(&Request) -> http::Response<Body> + Send + 'static,
{
    tokio::spawn(async move {
        let mut received = Vec::with_capacity(count);
        for _ in 0..count {
            let (request, send) = handle.next_request().await.expect("service not called");
            let request = Request::from_request(request)
                .await
                .expect("request should be readable");
            send.send_response(respond(&request));
            received.push(request);
        }
        received
    })
}
