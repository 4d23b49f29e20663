//! Route composition: turns an API tree into an axum `Router`.

mod resource;

use crate::error::ConfigError;
use crate::response::RenderDispatch;
use axum::Router;

/// Type-erased child API, so a parent can hold children of any resource type.
pub(crate) trait Mount: Send + Sync {
    fn name(&self) -> &str;
    fn base(&self) -> &str;
    /// Nests this API's subtree into `router` at its base path. `ancestors` holds the
    /// id parameter keys already used on the way down.
    fn mount(&self, router: Router, ancestors: &mut Vec<String>) -> Result<Router, ConfigError>;
    fn share_render_dispatch(&self, dispatch: &RenderDispatch);
}
