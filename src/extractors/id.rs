//! Resource id lookup from the request path.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};
use std::collections::HashMap;

/// Path parameter key used for a resource's id, e.g. "widget" -> "widgetID".
pub fn id_param_key(name: &str) -> String {
    format!("{}ID", name)
}

/// Path parameters resolved so far for this request. Filled in by each API level
/// as the request enters its `/{id}` scope.
#[derive(Clone, Debug, Default)]
pub struct PathIds(pub HashMap<String, String>);

impl PathIds {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for PathIds
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<PathIds>().cloned().unwrap_or_default())
    }
}

/// Id of the resource called `name`, if a path parameter for it has been resolved.
pub fn get_id_param(parts: &Parts, name: &str) -> Option<String> {
    parts
        .extensions
        .get::<PathIds>()
        .and_then(|ids| ids.get(&id_param_key(name)))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Full request path, before any prefix stripping done by nested routers.
pub fn request_path(parts: &Parts) -> &str {
    parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.0.path())
        .unwrap_or_else(|| parts.uri.path())
}

/// Scans `path` for the segments of `base` and returns the percent-decoded segment
/// right after them. Empty when `base` does not occur or nothing follows it.
pub fn find_id_param(path: &str, base: &str) -> String {
    let base: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    if base.is_empty() {
        return String::new();
    }
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments
        .windows(base.len() + 1)
        .find(|window| window[..base.len()] == base[..])
        .map(|window| decode_segment(window[base.len()]))
        .unwrap_or_default()
}

pub(crate) fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
