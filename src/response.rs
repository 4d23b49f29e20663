//! Content-negotiated rendering of handler results.

use crate::error::{ApiError, ErrorBody};
use crate::resource::Resource;
use axum::{
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// A value that can leave a handler as a response body.
pub trait Render: Send {
    fn to_json(&self) -> Result<Value, serde_json::Error>;

    fn html(&self, _parts: &Parts) -> Option<String> {
        None
    }
}

impl Render for Value {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        Ok(self.clone())
    }
}

impl Render for Box<dyn Render> {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        self.as_ref().to_json()
    }

    fn html(&self, parts: &Parts) -> Option<String> {
        self.as_ref().html(parts)
    }
}

/// Single resource, rendered through its optional HTML capability.
pub struct Rendered<T>(pub T);

impl<T: Resource> Render for Rendered<T> {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.0)
    }

    fn html(&self, parts: &Parts) -> Option<String> {
        self.0.as_html().map(|h| h.html(parts))
    }
}

/// Default read-all body: `{"items": [...]}`.
pub struct ResourceList<R> {
    pub items: Vec<R>,
}

impl<R: Render> Render for ResourceList<R> {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        let items = self
            .items
            .iter()
            .map(Render::to_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(serde_json::json!({ "items": items }))
    }
}

impl Render for ErrorBody {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Any serializable value, without an HTML form.
pub struct JsonBody<T>(pub T);

impl<T: Serialize + Send> Render for JsonBody<T> {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.0)
    }
}

/// Successful handler outcome.
pub enum Reply {
    Content { status: StatusCode, body: Box<dyn Render> },
    Empty(StatusCode),
}

impl Reply {
    pub fn ok(body: impl Render + 'static) -> Self {
        Reply::with_status(StatusCode::OK, body)
    }

    pub fn with_status(status: StatusCode, body: impl Render + 'static) -> Self {
        Reply::Content {
            status,
            body: Box::new(body),
        }
    }

    pub fn no_content() -> Self {
        Reply::Empty(StatusCode::NO_CONTENT)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Reply::Content { status, .. } | Reply::Empty(status) => *status,
        }
    }
}

/// Representation chosen from the `Accept` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Html,
    Plain,
}

/// First recognised media type in `Accept` wins; anything else means JSON.
pub fn accepted_content_type(headers: &HeaderMap) -> ContentType {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    for media in accept.split(',') {
        let media = media.split(';').next().unwrap_or("").trim();
        match media {
            "text/html" | "application/xhtml+xml" => return ContentType::Html,
            "application/json" | "text/javascript" => return ContentType::Json,
            "text/plain" => return ContentType::Plain,
            _ => {}
        }
    }
    ContentType::Json
}

pub type Responder =
    Arc<dyn Fn(&Parts, StatusCode, &dyn Render) -> Result<Response, ApiError> + Send + Sync>;

/// HTML when the client accepts it and the value can produce it, JSON otherwise.
pub fn default_responder(
    parts: &Parts,
    status: StatusCode,
    body: &dyn Render,
) -> Result<Response, ApiError> {
    if accepted_content_type(&parts.headers) == ContentType::Html {
        if let Some(html) = body.html(parts) {
            return Ok((status, Html(html)).into_response());
        }
    }
    let value = body
        .to_json()
        .map_err(|e| ApiError::Render(e.to_string()))?;
    Ok((status, Json(value)).into_response())
}

/// Shared rendering state for one or more API trees. The responder is set at most once;
/// later installs are ignored.
#[derive(Clone, Default)]
pub struct RenderDispatch {
    responder: Arc<OnceLock<Responder>>,
}

impl RenderDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when a responder was already in place.
    pub fn install(&self, responder: Responder) -> bool {
        let mut installed = false;
        self.responder.get_or_init(|| {
            installed = true;
            responder
        });
        installed
    }

    pub fn install_default(&self) -> bool {
        self.install(Arc::new(default_responder))
    }

    pub fn is_installed(&self) -> bool {
        self.responder.get().is_some()
    }

    /// The installed responder, if any.
    pub fn responder(&self) -> Option<Responder> {
        self.responder.get().cloned()
    }

    fn render(&self, parts: &Parts, status: StatusCode, body: &dyn Render) -> Result<Response, ApiError> {
        match self.responder.get() {
            Some(responder) => responder(parts, status, body),
            None => default_responder(parts, status, body),
        }
    }

    pub fn respond(&self, parts: &Parts, reply: Reply) -> Response {
        match reply {
            Reply::Empty(status) => status.into_response(),
            Reply::Content { status, body } => {
                self.render(parts, status, body.as_ref()).unwrap_or_else(|err| {
                    tracing::error!(error = %err, "unable to render response");
                    ApiError::Render(err.to_string()).into_response()
                })
            }
        }
    }

    /// Renders a handler result. Errors are logged, then rendered through the same
    /// responder as successful replies; the plain JSON error is the last resort.
    pub fn handle(&self, parts: &Parts, result: Result<Reply, ApiError>) -> Response {
        match result {
            Ok(reply) => self.respond(parts, reply),
            Err(err) => {
                tracing::error!(
                    status = err.status().as_u16(),
                    error = %err,
                    "error returned from handler"
                );
                self.render(parts, err.status(), &err.body())
                    .unwrap_or_else(|render_err| {
                        tracing::error!(error = %render_err, "unable to render error response");
                        err.into_response()
                    })
            }
        }
    }

    /// Dispatch carried by the request, or a fresh default one.
    pub fn from_parts(parts: &Parts) -> Self {
        parts.extensions.get::<RenderDispatch>().cloned().unwrap_or_default()
    }
}
