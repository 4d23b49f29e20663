//! HTTP handlers: default resource CRUD and the wrappers custom handlers are built from.

pub mod resource;
pub mod wrap;

pub use wrap::{read_request_body_and_do, HandlerFuture};
