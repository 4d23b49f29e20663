//! Resource SDK: derives REST routes for resource types on top of axum.
//!
//! An [`Api`] wraps one resource type and its [`Storage`]. It exposes create and list on
//! its base path, read/replace/patch/delete under `/:<name>ID`, and can nest other APIs
//! under that id so that `/widgets/:widgetID/parts/:partID` works out of the box.

pub mod api;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod html;
pub mod middleware;
pub mod resource;
pub mod response;
mod routes;
pub mod store;

pub use api::{new_root_api, Api, DEFAULT_BODY_LIMIT};
pub use error::{ApiError, ConfigError, StorageError};
pub use extractors::{get_from_request, query_params, PathIds, RequestBody};
pub use handlers::{read_request_body_and_do, HandlerFuture};
pub use html::{must_render_html, must_render_html_map};
pub use resource::{DefaultResource, HtmlRenderer, Id, NilResource, Patcher, Resource};
pub use response::{
    accepted_content_type, default_responder, ContentType, JsonBody, Render, RenderDispatch,
    Rendered, Reply, Responder, ResourceList,
};
pub use store::{FilterFn, MemoryStorage, Storage};
