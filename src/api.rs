//! API descriptor: one per resource type. Cheap to clone; clones share state, so a
//! child can still be configured and queried after it has been nested.

use crate::error::{ApiError, ConfigError};
use crate::extractors::id::{find_id_param, get_id_param, id_param_key, request_path};
use crate::resource::{NilResource, Resource};
use crate::response::{Render, RenderDispatch, Rendered, Reply, Responder, ResourceList};
use crate::routes::Mount;
use crate::store::{FilterFn, MemoryStorage, Storage};
use axum::{
    extract::Request,
    handler::Handler,
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter, Route},
    Router,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, OnceLock};
use tower::{Layer, Service};

/// Default request body limit for a top-level API tree.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

pub(crate) type Middleware = Arc<dyn Fn(Router) -> Router + Send + Sync>;
pub type CreateOrUpdateHook<T> = Arc<dyn Fn(&Parts, &T) -> Result<(), ApiError> + Send + Sync>;
pub type DeleteHook = Arc<dyn Fn(&Parts) -> Result<(), ApiError> + Send + Sync>;
pub type ResponseWrapper<T> = Arc<dyn Fn(T) -> Box<dyn Render> + Send + Sync>;
pub type ListResponseWrapper<T> = Arc<dyn Fn(Vec<T>) -> Box<dyn Render> + Send + Sync>;
pub type FilterExtractor<T> = Arc<dyn Fn(&Parts) -> Option<FilterFn<T>> + Send + Sync>;

/// A caller-supplied route: exact method and path pattern.
#[derive(Clone)]
pub(crate) struct CustomRoute {
    pub(crate) method: Method,
    pub(crate) pattern: String,
    pub(crate) handler: MethodRouter,
}

impl CustomRoute {
    fn new<H, X>(method: Method, pattern: &str, handler: H) -> Result<Self, ConfigError>
    where
        H: Handler<X, ()>,
        X: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| ConfigError::UnsupportedMethod(method.clone()))?;
        Ok(CustomRoute {
            method,
            pattern: normalize_pattern(pattern),
            handler: axum::routing::on(filter, handler),
        })
    }
}

/// Non-owning link from a child to the API it is nested under.
#[derive(Clone, Debug)]
pub(crate) struct ParentLink {
    pub(crate) name: String,
}

pub(crate) struct Settings<T> {
    pub(crate) middlewares: Vec<Middleware>,
    pub(crate) id_middlewares: Vec<Middleware>,
    pub(crate) root_routes: Vec<CustomRoute>,
    pub(crate) custom_routes: Vec<CustomRoute>,
    pub(crate) custom_id_routes: Vec<CustomRoute>,
    pub(crate) children: Vec<Arc<dyn Mount>>,
    pub(crate) response_codes: HashMap<Method, StatusCode>,
    pub(crate) response_wrapper: Option<ResponseWrapper<T>>,
    pub(crate) get_all_response_wrapper: Option<ListResponseWrapper<T>>,
    pub(crate) get_all_filter: Option<FilterExtractor<T>>,
    pub(crate) on_create_or_update: Option<CreateOrUpdateHook<T>>,
    pub(crate) before_delete: Option<DeleteHook>,
    pub(crate) after_delete: Option<DeleteHook>,
    pub(crate) render: RenderDispatch,
    pub(crate) body_limit: usize,
    pub(crate) root_api: bool,
}

impl<T> Default for Settings<T> {
    fn default() -> Self {
        Settings {
            middlewares: Vec::new(),
            id_middlewares: Vec::new(),
            root_routes: Vec::new(),
            custom_routes: Vec::new(),
            custom_id_routes: Vec::new(),
            children: Vec::new(),
            response_codes: HashMap::new(),
            response_wrapper: None,
            get_all_response_wrapper: None,
            get_all_filter: None,
            on_create_or_update: None,
            before_delete: None,
            after_delete: None,
            render: RenderDispatch::new(),
            body_limit: DEFAULT_BODY_LIMIT,
            root_api: false,
        }
    }
}

pub(crate) struct ApiInner<T: Resource> {
    pub(crate) name: String,
    pub(crate) base: String,
    pub(crate) storage: Arc<dyn Storage<T>>,
    pub(crate) parent: OnceLock<ParentLink>,
    pub(crate) settings: RwLock<Settings<T>>,
}

/// Routes and handlers for one resource type.
pub struct Api<T: Resource> {
    pub(crate) inner: Arc<ApiInner<T>>,
}

impl<T: Resource> Clone for Api<T> {
    fn clone(&self) -> Self {
        Api {
            inner: self.inner.clone(),
        }
    }
}

/// Pure mounting point: exposes no CRUD routes, only its nested APIs.
pub fn new_root_api(name: &str, base: &str) -> Api<NilResource> {
    let api = Api::new(name, base, MemoryStorage::new());
    api.inner.settings.write().root_api = true;
    api
}

impl<T: Resource> Api<T> {
    /// `name` derives the id parameter key; `base` is the mount path, e.g. "/widgets".
    pub fn new(name: &str, base: &str, storage: impl Storage<T>) -> Self {
        Self::with_storage(name, base, Arc::new(storage))
    }

    pub fn with_storage(name: &str, base: &str, storage: Arc<dyn Storage<T>>) -> Self {
        Api {
            inner: Arc::new(ApiInner {
                name: name.to_string(),
                base: normalize_base(base),
                storage,
                parent: OnceLock::new(),
                settings: RwLock::new(Settings::default()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn base(&self) -> &str {
        &self.inner.base
    }

    pub fn storage(&self) -> &Arc<dyn Storage<T>> {
        &self.inner.storage
    }

    pub fn id_param_key(&self) -> String {
        id_param_key(&self.inner.name)
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.inner.parent.get().map(|p| p.name.as_str())
    }

    pub fn is_root_api(&self) -> bool {
        self.inner.settings.read().root_api
    }

    /// Id of this API's resource in the current request. Falls back to scanning the
    /// request path when the id scope has not been entered yet (e.g. from a parent's
    /// middleware). Empty when it cannot be resolved.
    pub fn get_id_param(&self, parts: &Parts) -> String {
        if let Some(id) = get_id_param(parts, &self.inner.name) {
            return id;
        }
        if self.inner.parent.get().is_some() {
            return find_id_param(request_path(parts), &self.inner.base);
        }
        String::new()
    }

    /// Fetches the resource addressed by the request path.
    pub async fn get_requested_resource(&self, parts: &Parts) -> Result<T, ApiError> {
        let id = self.get_id_param(parts);
        self.inner.storage.get(&id).await.map_err(|err| {
            let err = ApiError::from(err);
            if err != ApiError::NotFound {
                tracing::error!(api = %self.inner.name, id = %id, error = %err, "error getting requested resource");
            }
            err
        })
    }

    /// Collection-scope middleware: wraps this API's whole subtree.
    pub fn add_middleware<L>(&self, layer: L) -> &Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.inner
            .settings
            .write()
            .middlewares
            .push(Arc::new(move |router: Router| router.layer(layer.clone())));
        self
    }

    /// ID-scope middleware: runs under `/{id}` after the existence check.
    pub fn add_id_middleware<L>(&self, layer: L) -> &Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.inner
            .settings
            .write()
            .id_middlewares
            .push(Arc::new(move |router: Router| router.layer(layer.clone())));
        self
    }

    /// Route registered on the outer router, outside the base path. Only used when
    /// this API is the top of its tree.
    pub fn add_custom_root_route<H, X>(
        &self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&Self, ConfigError>
    where
        H: Handler<X, ()>,
        X: 'static,
    {
        let route = CustomRoute::new(method, pattern, handler)?;
        push_unique(&mut self.inner.settings.write().root_routes, route)?;
        Ok(self)
    }

    /// Route under the base path. A route on `/` with POST or GET replaces the default
    /// create or list handler.
    pub fn add_custom_route<H, X>(
        &self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&Self, ConfigError>
    where
        H: Handler<X, ()>,
        X: 'static,
    {
        let route = CustomRoute::new(method, pattern, handler)?;
        push_unique(&mut self.inner.settings.write().custom_routes, route)?;
        Ok(self)
    }

    /// Route under `/{id}`. A route on `/` with GET, PUT, PATCH or DELETE replaces the
    /// matching default handler.
    pub fn add_custom_id_route<H, X>(
        &self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&Self, ConfigError>
    where
        H: Handler<X, ()>,
        X: 'static,
    {
        let route = CustomRoute::new(method, pattern, handler)?;
        push_unique(&mut self.inner.settings.write().custom_id_routes, route)?;
        Ok(self)
    }

    /// Mounts `child` under this API's `/{id}`.
    pub fn add_nested_api<C: Resource>(&self, child: &Api<C>) -> Result<&Self, ConfigError> {
        if child.base().is_empty() {
            return Err(ConfigError::MissingBasePath(child.name().to_string()));
        }
        if self
            .inner
            .settings
            .read()
            .children
            .iter()
            .any(|c| c.base() == child.base())
        {
            return Err(ConfigError::DuplicatePathSegment(child.base().to_string()));
        }
        child
            .inner
            .parent
            .set(ParentLink {
                name: self.inner.name.clone(),
            })
            .map_err(|_| ConfigError::AlreadyNested(child.name().to_string()))?;
        self.inner
            .settings
            .write()
            .children
            .push(Arc::new(child.clone()));
        child.share_render_dispatch(&self.render_dispatch());
        Ok(self)
    }

    /// Replaces the default success status for `method`.
    pub fn set_response_code(&self, method: Method, status: StatusCode) -> &Self {
        self.inner.settings.write().response_codes.insert(method, status);
        self
    }

    pub fn set_response_wrapper<F>(&self, wrapper: F) -> &Self
    where
        F: Fn(T) -> Box<dyn Render> + Send + Sync + 'static,
    {
        self.inner.settings.write().response_wrapper = Some(Arc::new(wrapper));
        self
    }

    pub fn set_get_all_response_wrapper<F>(&self, wrapper: F) -> &Self
    where
        F: Fn(Vec<T>) -> Box<dyn Render> + Send + Sync + 'static,
    {
        self.inner.settings.write().get_all_response_wrapper = Some(Arc::new(wrapper));
        self
    }

    /// Builds the read-all filter from the request, typically its query string.
    pub fn set_get_all_filter<F>(&self, filter: F) -> &Self
    where
        F: Fn(&Parts) -> Option<FilterFn<T>> + Send + Sync + 'static,
    {
        self.inner.settings.write().get_all_filter = Some(Arc::new(filter));
        self
    }

    /// Runs before every create, replace and patch is stored. An error aborts the write.
    pub fn set_on_create_or_update<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Parts, &T) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.inner.settings.write().on_create_or_update = Some(Arc::new(hook));
        self
    }

    pub fn set_before_delete<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Parts) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.inner.settings.write().before_delete = Some(Arc::new(hook));
        self
    }

    pub fn set_after_delete<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Parts) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.inner.settings.write().after_delete = Some(Arc::new(hook));
        self
    }

    /// Installs a custom responder into the dispatch shared by this API's whole tree.
    /// Returns `false` when one is already in place; routing a tree installs the
    /// default, so call this before `route`/`router`.
    pub fn set_responder(&self, responder: Responder) -> bool {
        self.render_dispatch().install(responder)
    }

    /// Makes this API and its nested APIs render through `dispatch`, so several trees
    /// can share one responder. A responder already set here carries over unless
    /// `dispatch` has its own.
    pub fn share_render_dispatch(&self, dispatch: &RenderDispatch) -> &Self {
        let (previous, children) = {
            let mut settings = self.inner.settings.write();
            let previous = std::mem::replace(&mut settings.render, dispatch.clone());
            (previous, settings.children.clone())
        };
        if let Some(responder) = previous.responder() {
            dispatch.install(responder);
        }
        for child in &children {
            child.share_render_dispatch(dispatch);
        }
        self
    }

    pub fn render_dispatch(&self) -> RenderDispatch {
        self.inner.settings.read().render.clone()
    }

    /// Request body limit applied when this API is the top of its tree.
    pub fn set_body_limit(&self, bytes: usize) -> &Self {
        self.inner.settings.write().body_limit = bytes;
        self
    }

    pub(crate) fn status_for(&self, method: &Method, default: StatusCode) -> StatusCode {
        self.status_override(method).unwrap_or(default)
    }

    pub(crate) fn status_override(&self, method: &Method) -> Option<StatusCode> {
        self.inner.settings.read().response_codes.get(method).copied()
    }

    pub(crate) fn wrap_one(&self, resource: T) -> Box<dyn Render> {
        let wrapper = self.inner.settings.read().response_wrapper.clone();
        match wrapper {
            Some(wrap) => wrap(resource),
            None => Box::new(Rendered(resource)),
        }
    }

    pub(crate) fn wrap_all(&self, resources: Vec<T>) -> Box<dyn Render> {
        let wrapper = self.inner.settings.read().get_all_response_wrapper.clone();
        match wrapper {
            Some(wrap) => wrap(resources),
            None => Box::new(ResourceList {
                items: resources.into_iter().map(|r| self.wrap_one(r)).collect(),
            }),
        }
    }

    pub(crate) fn get_all_filter(&self, parts: &Parts) -> Option<FilterFn<T>> {
        let extractor = self.inner.settings.read().get_all_filter.clone();
        extractor.and_then(|f| f(parts))
    }

    pub(crate) fn on_create_or_update(&self, parts: &Parts, resource: &T) -> Result<(), ApiError> {
        let hook = self.inner.settings.read().on_create_or_update.clone();
        hook.map_or(Ok(()), |f| f(parts, resource))
    }

    pub(crate) fn before_delete(&self, parts: &Parts) -> Result<(), ApiError> {
        let hook = self.inner.settings.read().before_delete.clone();
        hook.map_or(Ok(()), |f| f(parts))
    }

    pub(crate) fn after_delete(&self, parts: &Parts) -> Result<(), ApiError> {
        let hook = self.inner.settings.read().after_delete.clone();
        hook.map_or(Ok(()), |f| f(parts))
    }

    pub(crate) fn is_top_level(&self) -> bool {
        self.inner.parent.get().is_none()
    }

    /// Renders a handler result through the dispatch carried by the request.
    pub(crate) fn finish(&self, parts: &Parts, result: Result<Reply, ApiError>) -> Response {
        RenderDispatch::from_parts(parts).handle(parts, result)
    }
}

fn push_unique(routes: &mut Vec<CustomRoute>, route: CustomRoute) -> Result<(), ConfigError> {
    if routes
        .iter()
        .any(|r| r.method == route.method && r.pattern == route.pattern)
    {
        return Err(ConfigError::DuplicateRoute {
            method: route.method,
            pattern: route.pattern,
        });
    }
    routes.push(route);
    Ok(())
}

/// "" and "/" mean "mount in place"; anything else gets a leading slash and no trailing one.
fn normalize_base(base: &str) -> String {
    let trimmed = base.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

pub(crate) fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DefaultResource;

    fn widgets() -> Api<DefaultResource> {
        Api::new("widget", "/widgets", MemoryStorage::new())
    }

    async fn ok() -> &'static str {
        "ok"
    }

    #[test]
    fn base_and_pattern_normalization() {
        assert_eq!(normalize_base("widgets/"), "/widgets");
        assert_eq!(normalize_base("/"), "");
        assert_eq!(normalize_pattern(""), "/");
        assert_eq!(normalize_pattern("count/"), "/count");
        assert_eq!(normalize_pattern("/count"), "/count");
    }

    #[test]
    fn duplicate_custom_route_is_rejected() {
        let api = widgets();
        api.add_custom_route(Method::GET, "/count", ok).unwrap();
        let err = api.add_custom_route(Method::GET, "/count/", ok).err().unwrap();
        assert!(matches!(err, ConfigError::DuplicateRoute { .. }));

        // same pattern, other method or other scope is fine
        api.add_custom_route(Method::POST, "/count", ok).unwrap();
        api.add_custom_id_route(Method::GET, "/count", ok).unwrap();
        api.add_custom_root_route(Method::GET, "/count", ok).unwrap();
    }

    #[test]
    fn unroutable_method_is_rejected() {
        let api = widgets();
        let method = Method::from_bytes(b"PURGE").unwrap();
        let err = api.add_custom_route(method, "/", ok).err().unwrap();
        assert!(matches!(err, ConfigError::UnsupportedMethod(_)));
    }

    #[test]
    fn nesting_rules() {
        let parent = widgets();
        let child: Api<DefaultResource> = Api::new("part", "/parts", MemoryStorage::new());
        parent.add_nested_api(&child).unwrap();
        assert_eq!(child.parent_name(), Some("widget"));
        assert!(!child.is_top_level());

        let other: Api<DefaultResource> = Api::new("gadget", "/gadgets", MemoryStorage::new());
        let err = other.add_nested_api(&child).err().unwrap();
        assert!(matches!(err, ConfigError::AlreadyNested(_)));

        let twin: Api<DefaultResource> = Api::new("piece", "/parts", MemoryStorage::new());
        let err = parent.add_nested_api(&twin).err().unwrap();
        assert!(matches!(err, ConfigError::DuplicatePathSegment(_)));

        let rootless: Api<DefaultResource> = Api::new("thing", "/", MemoryStorage::new());
        let err = parent.add_nested_api(&rootless).err().unwrap();
        assert!(matches!(err, ConfigError::MissingBasePath(_)));
    }

    #[test]
    fn response_codes_override_defaults() {
        let api = widgets();
        assert_eq!(api.status_for(&Method::POST, StatusCode::CREATED), StatusCode::CREATED);
        api.set_response_code(Method::POST, StatusCode::ACCEPTED);
        assert_eq!(api.status_for(&Method::POST, StatusCode::CREATED), StatusCode::ACCEPTED);
        assert_eq!(api.status_override(&Method::GET), None);
    }

    #[test]
    fn nested_apis_share_the_parent_dispatch() {
        let parent = widgets();
        let child: Api<DefaultResource> = Api::new("part", "/parts", MemoryStorage::new());
        let grandchild: Api<DefaultResource> = Api::new("bolt", "/bolts", MemoryStorage::new());
        child.add_nested_api(&grandchild).unwrap();
        assert!(child.set_responder(Arc::new(crate::response::default_responder)));

        parent.add_nested_api(&child).unwrap();
        assert!(parent.render_dispatch().is_installed());
        assert!(grandchild.render_dispatch().is_installed());
        assert!(!grandchild.set_responder(Arc::new(crate::response::default_responder)));
    }

    #[test]
    fn root_api_flag() {
        let root = new_root_api("root", "/api");
        assert!(root.is_root_api());
        assert!(!widgets().is_root_api());
    }
}
