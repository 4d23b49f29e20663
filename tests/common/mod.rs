#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, request::Parts, Method, Request, StatusCode},
    Router,
};
use resource_sdk::{ApiError, DefaultResource, HtmlRenderer, Patcher, Resource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceExt;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Widget {
    #[serde(flatten)]
    pub base: DefaultResource,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
}

impl Resource for Widget {
    fn id(&self) -> String {
        self.base.id.to_string()
    }

    fn bind(&mut self, parts: &Parts) -> Result<(), ApiError> {
        self.base.bind(parts)
    }

    fn as_patcher(&mut self) -> Option<&mut dyn Patcher<Self>> {
        Some(self)
    }

    fn as_html(&self) -> Option<&dyn HtmlRenderer> {
        Some(self)
    }
}

impl Patcher<Widget> for Widget {
    fn patch(&mut self, patch: Widget) -> Result<(), ApiError> {
        if !patch.name.is_empty() {
            self.name = patch.name;
        }
        if !patch.color.is_empty() {
            self.color = patch.color;
        }
        Ok(())
    }
}

impl HtmlRenderer for Widget {
    fn html(&self, _parts: &Parts) -> String {
        format!("<div>{}</div>", self.name)
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub headers: axum::http::HeaderMap,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    send_with(router, method, uri, body, None).await
}

pub async fn send_with(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    accept: Option<&str>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(accept) = accept {
        builder = builder.header(header::ACCEPT, accept);
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let res = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        content_type,
        headers,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn send_raw(router: &Router, method: Method, uri: &str, body: &str) -> TestResponse {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        content_type: String::new(),
        headers,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    }
}
