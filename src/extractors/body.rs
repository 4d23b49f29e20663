//! Decoding a resource from the request body.

use crate::error::ApiError;
use crate::resource::Resource;
use axum::{
    body::Body,
    extract::Query,
    http::{request::Parts, StatusCode},
};
use http_body_util::LengthLimitError;
use std::collections::HashMap;

/// A body already decoded by earlier middleware. When present in the request
/// extensions it is used instead of reading the body again.
#[derive(Clone, Debug)]
pub struct RequestBody<T>(pub T);

/// Reads `T` from the request extensions or decodes it from the JSON body, then runs
/// [`Resource::bind`].
pub async fn get_from_request<T: Resource>(parts: &Parts, body: Body) -> Result<T, ApiError> {
    if let Some(RequestBody(resource)) = parts.extensions.get::<RequestBody<T>>() {
        return Ok(resource.clone());
    }

    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(read_error)?;
    let mut resource: T = serde_json::from_slice(&bytes).map_err(ApiError::invalid_request)?;
    resource.bind(parts)?;
    Ok(resource)
}

/// A body cut off by the request size limit is 413; anything else is a bad request.
fn read_error(err: axum::Error) -> ApiError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return ApiError::Status {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                message: "request body too large".to_string(),
            };
        }
        source = e.source();
    }
    ApiError::invalid_request(err)
}

/// Query string as a flat map; malformed queries yield an empty map.
pub fn query_params(parts: &Parts) -> HashMap<String, String> {
    Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DefaultResource, Id};
    use axum::http::{Method, Request};

    fn request(method: Method, body: &str) -> (Parts, Body) {
        Request::builder()
            .method(method)
            .uri("/widgets?color=red&size=2")
            .body(Body::from(body.to_string()))
            .unwrap()
            .into_parts()
    }

    #[tokio::test]
    async fn decodes_and_binds() {
        let (parts, body) = request(Method::POST, "{}");
        let r: DefaultResource = get_from_request(&parts, body).await.unwrap();
        assert!(!r.id.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_request() {
        let (parts, body) = request(Method::POST, "{not json");
        let err = get_from_request::<DefaultResource>(&parts, body).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn body_over_limit_is_payload_too_large() {
        let (parts, _) = request(Method::POST, "");
        let body = Body::new(http_body_util::Limited::new(Body::from("x".repeat(64)), 16));
        let err = get_from_request::<DefaultResource>(&parts, body).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn bind_errors_pass_through() {
        let (parts, body) = request(Method::PUT, "{}");
        let err = get_from_request::<DefaultResource>(&parts, body).await.unwrap_err();
        assert_eq!(err, ApiError::invalid_request("missing required id field"));
    }

    #[tokio::test]
    async fn prefers_body_from_extensions() {
        let (mut parts, body) = request(Method::PUT, "garbage");
        parts
            .extensions
            .insert(RequestBody(DefaultResource { id: Id::from("ctx") }));
        let r: DefaultResource = get_from_request(&parts, body).await.unwrap();
        assert_eq!(r.id.as_str(), "ctx");
    }

    #[test]
    fn query_to_map() {
        let (parts, _) = request(Method::GET, "");
        let q = query_params(&parts);
        assert_eq!(q.get("color").map(String::as_str), Some("red"));
        assert_eq!(q.get("size").map(String::as_str), Some("2"));
    }
}
