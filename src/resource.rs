//! Resource capabilities: identifier, binding, optional patch and HTML support.

use crate::error::ApiError;
use axum::http::{request::Parts, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// A value that can be served by an [`crate::Api`].
///
/// Optional capabilities are exposed through `as_patcher` / `as_html`; a type opts in by
/// implementing the matching trait and returning `Some(self)`.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> String;

    /// Runs after the body is decoded; errors are returned to the client unchanged.
    fn bind(&mut self, _parts: &Parts) -> Result<(), ApiError> {
        Ok(())
    }

    fn as_patcher(&mut self) -> Option<&mut dyn Patcher<Self>> {
        None
    }

    fn as_html(&self) -> Option<&dyn HtmlRenderer> {
        None
    }
}

/// Applies a PATCH payload to an existing resource in place.
pub trait Patcher<T> {
    fn patch(&mut self, patch: T) -> Result<(), ApiError>;
}

/// HTML representation used when the client accepts `text/html`.
pub trait HtmlRenderer {
    fn html(&self, parts: &Parts) -> String;
}

/// Resource identifier. Serialized as a plain string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    /// Fresh random identifier.
    pub fn new() -> Self {
        Id(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(s.to_string())
    }
}

/// Embeddable base carrying an [`Id`]. Flatten it into a resource struct and
/// delegate `id`/`bind` to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultResource {
    #[serde(default)]
    pub id: Id,
}

impl DefaultResource {
    /// POST always gets a server-generated id; PUT must carry one.
    pub fn bind(&mut self, parts: &Parts) -> Result<(), ApiError> {
        if parts.method == Method::POST {
            self.id = Id::new();
        } else if parts.method == Method::PUT && self.id.is_empty() {
            return Err(ApiError::invalid_request("missing required id field"));
        }
        Ok(())
    }
}

impl Resource for DefaultResource {
    fn id(&self) -> String {
        self.id.0.clone()
    }

    fn bind(&mut self, parts: &Parts) -> Result<(), ApiError> {
        DefaultResource::bind(self, parts)
    }
}

/// Resource type of a pure mounting-point API. It is never stored or served.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NilResource {}

impl Resource for NilResource {
    fn id(&self) -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(method: Method) -> Parts {
        Request::builder()
            .method(method)
            .uri("/widgets")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn post_assigns_fresh_id() {
        let mut r = DefaultResource { id: Id::from("client-chosen") };
        r.bind(&parts(Method::POST)).unwrap();
        assert!(!r.id.is_empty());
        assert_ne!(r.id.as_str(), "client-chosen");
    }

    #[test]
    fn put_requires_id() {
        let mut r = DefaultResource::default();
        let err = r.bind(&parts(Method::PUT)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let mut r = DefaultResource { id: Id::from("abc") };
        assert!(r.bind(&parts(Method::PUT)).is_ok());
        assert_eq!(r.id(), "abc");
    }

    #[test]
    fn patch_leaves_id_alone() {
        let mut r = DefaultResource::default();
        r.bind(&parts(Method::PATCH)).unwrap();
        assert!(r.id.is_empty());
    }

    #[test]
    fn default_capabilities_are_absent() {
        let mut r = DefaultResource::default();
        assert!(r.as_patcher().is_none());
        assert!(r.as_html().is_none());
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let r = DefaultResource { id: Id::from("abc") };
        assert_eq!(serde_json::to_value(&r).unwrap(), serde_json::json!({"id": "abc"}));
        let back: DefaultResource = serde_json::from_str("{}").unwrap();
        assert!(back.id.is_empty());
    }
}
