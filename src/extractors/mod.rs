//! Request extractors: resource ids from the path, resources from the body.

pub mod body;
pub mod id;

pub use body::{get_from_request, query_params, RequestBody};
pub use id::{find_id_param, get_id_param, id_param_key, PathIds};
