//! Resource routes:
//! `POST /` and `GET /` on the collection, `GET|PUT|PATCH|DELETE /:<name>ID` on one
//! resource, with nested APIs and custom ID routes mounted under `/:<name>ID`.

use super::Mount;
use crate::api::{Api, CustomRoute, Middleware};
use crate::error::ConfigError;
use crate::handlers::resource::{create, delete, list, patch, read, replace, resource_exists};
use crate::middleware::default_middleware;
use crate::resource::Resource;
use crate::response::RenderDispatch;
use axum::{
    extract::Request,
    http::Method,
    routing::{on, MethodFilter, MethodRouter},
    Extension, Router,
};
use std::collections::BTreeMap;

impl<T: Resource> Api<T> {
    /// Adds this API's routes to `router`. Only the top of a tree gets root routes and the
    /// default middleware stack.
    pub fn route(&self, router: Router) -> Result<Router, ConfigError> {
        let (render, body_limit, root_routes, middlewares) = {
            let settings = self.inner.settings.read();
            (
                settings.render.clone(),
                settings.body_limit,
                settings.root_routes.clone(),
                settings.middlewares.clone(),
            )
        };

        let mut router = router;
        let top_level = self.is_top_level();
        if top_level && !root_routes.is_empty() {
            check_conflicts(&root_routes, &self.mounted_patterns())?;
            let root = compose(Vec::new(), &root_routes);
            let root = apply_middlewares(root, &middlewares).layer(Extension(render.clone()));
            router = router.merge(root);
        }

        let mut ancestors = Vec::new();
        let mut subtree = self.subtree(&mut ancestors)?;
        if top_level {
            subtree = default_middleware(subtree, &render, body_limit);
        }
        render.install_default();
        tracing::debug!(api = %self.name(), base = %self.base(), "mounted api");

        Ok(if self.base().is_empty() {
            router.merge(subtree)
        } else {
            router.nest(self.base(), subtree)
        })
    }

    /// A fresh router holding only this API tree.
    pub fn router(&self) -> Result<Router, ConfigError> {
        self.route(Router::new())
    }

    fn subtree(&self, ancestors: &mut Vec<String>) -> Result<Router, ConfigError> {
        let key = self.id_param_key();
        if ancestors.contains(&key) {
            return Err(ConfigError::DuplicateIdParam(key));
        }

        let settings = self.inner.settings.read();
        let middlewares = settings.middlewares.clone();
        let id_middlewares = settings.id_middlewares.clone();
        let custom_routes = settings.custom_routes.clone();
        let custom_id_routes = settings.custom_id_routes.clone();
        let children = settings.children.clone();
        let root_api = settings.root_api;
        drop(settings);

        if root_api {
            let mut router = Router::new();
            for child in &children {
                router = child.mount(router, ancestors)?;
            }
            return Ok(apply_middlewares(router, &middlewares));
        }

        let id_scope = format!("/:{}", key);
        check_conflicts(&custom_routes, std::slice::from_ref(&id_scope))?;
        check_conflicts(&custom_id_routes, &[])?;

        let collection = compose(
            vec![
                (Method::POST, self.endpoint(MethodFilter::POST, create::<T>)),
                (Method::GET, self.endpoint(MethodFilter::GET, list::<T>)),
            ],
            &custom_routes,
        );

        let mut by_id = compose(
            vec![
                (Method::GET, self.endpoint(MethodFilter::GET, read::<T>)),
                (Method::DELETE, self.endpoint(MethodFilter::DELETE, delete::<T>)),
                (Method::PUT, self.endpoint(MethodFilter::PUT, replace::<T>)),
                (Method::PATCH, self.endpoint(MethodFilter::PATCH, patch::<T>)),
            ],
            &custom_id_routes,
        );

        ancestors.push(key.clone());
        for child in &children {
            let nested = format!("{}/", child.base());
            if custom_id_routes
                .iter()
                .any(|r| r.pattern == child.base() || r.pattern.starts_with(&nested))
            {
                return Err(ConfigError::DuplicatePathSegment(child.base().to_string()));
            }
            tracing::debug!(api = %self.name(), child = %child.name(), "mounting nested api");
            by_id = child.mount(by_id, ancestors)?;
        }
        ancestors.pop();

        let by_id = apply_middlewares(by_id, &id_middlewares).layer(
            axum::middleware::from_fn_with_state(self.clone(), resource_exists::<T>),
        );
        let collection = collection.nest(&id_scope, by_id);
        Ok(apply_middlewares(collection, &middlewares))
    }

    /// Full paths this API occupies once mounted, as seen from the outer router.
    fn mounted_patterns(&self) -> Vec<String> {
        let settings = self.inner.settings.read();
        let own: Vec<String> = if settings.root_api {
            settings.children.iter().map(|c| c.base().to_string()).collect()
        } else {
            std::iter::once("/".to_string())
                .chain(settings.custom_routes.iter().map(|r| r.pattern.clone()))
                .chain(std::iter::once(format!("/:{}", self.id_param_key())))
                .collect()
        };
        own.iter().map(|p| join(self.base(), p)).collect()
    }

    fn endpoint<F, Fut>(&self, filter: MethodFilter, handler: F) -> MethodRouter
    where
        F: Fn(Api<T>, Request) -> Fut + Clone + Send + Sync + 'static,
        Fut: std::future::Future<Output = axum::response::Response> + Send + 'static,
    {
        let api = self.clone();
        on(filter, move |req: Request| handler(api, req))
    }
}

impl<T: Resource> Mount for Api<T> {
    fn name(&self) -> &str {
        Api::name(self)
    }

    fn base(&self) -> &str {
        Api::base(self)
    }

    fn mount(&self, router: Router, ancestors: &mut Vec<String>) -> Result<Router, ConfigError> {
        let subtree = self.subtree(ancestors)?;
        Ok(router.nest(Api::base(self), subtree))
    }

    fn share_render_dispatch(&self, dispatch: &RenderDispatch) {
        Api::share_render_dispatch(self, dispatch);
    }
}

/// Groups routes by pattern. A custom route on `/` replaces the default for its method.
fn compose(defaults: Vec<(Method, MethodRouter)>, custom: &[CustomRoute]) -> Router {
    let mut by_pattern: BTreeMap<String, MethodRouter> = BTreeMap::new();
    for (method, handler) in defaults {
        if custom.iter().any(|r| r.pattern == "/" && r.method == method) {
            continue;
        }
        merge_into(&mut by_pattern, "/", handler);
    }
    for route in custom {
        merge_into(&mut by_pattern, &route.pattern, route.handler.clone());
    }
    by_pattern
        .into_iter()
        .fold(Router::new(), |router, (pattern, handler)| router.route(&pattern, handler))
}

fn merge_into(by_pattern: &mut BTreeMap<String, MethodRouter>, pattern: &str, handler: MethodRouter) {
    let merged = match by_pattern.remove(pattern) {
        Some(existing) => existing.merge(handler),
        None => handler,
    };
    by_pattern.insert(pattern.to_string(), merged);
}

/// First registered middleware ends up outermost.
fn apply_middlewares(router: Router, middlewares: &[Middleware]) -> Router {
    middlewares
        .iter()
        .rev()
        .fold(router, |router, middleware| middleware(router))
}

fn join(base: &str, pattern: &str) -> String {
    match (base.is_empty(), pattern == "/") {
        (true, _) => pattern.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}{}", base, pattern),
    }
}

/// Rejects custom routes that axum could not register next to each other, or next to
/// the `occupied` paths of the same router.
fn check_conflicts(custom: &[CustomRoute], occupied: &[String]) -> Result<(), ConfigError> {
    for (i, route) in custom.iter().enumerate() {
        let clash = custom[..i]
            .iter()
            .map(|r| &r.pattern)
            .find(|other| patterns_conflict(&route.pattern, other))
            .or_else(|| {
                occupied
                    .iter()
                    .find(|other| route.pattern == **other || patterns_conflict(&route.pattern, other))
            });
        if let Some(other) = clash {
            return Err(ConfigError::RouteConflict {
                pattern: route.pattern.clone(),
                other: other.clone(),
            });
        }
    }
    Ok(())
}

/// Two patterns clash when they reach the same position with differently named
/// parameters, or when a catch-all meets anything but an identical catch-all.
fn patterns_conflict(a: &str, b: &str) -> bool {
    let mut left = a.split('/').filter(|s| !s.is_empty());
    let mut right = b.split('/').filter(|s| !s.is_empty());
    loop {
        match (left.next(), right.next()) {
            (Some(l), Some(r)) => {
                if l.starts_with('*') || r.starts_with('*') {
                    return l != r;
                }
                match (l.starts_with(':'), r.starts_with(':')) {
                    (true, true) if l != r => return true,
                    (true, true) => continue,
                    (false, false) if l == r => continue,
                    _ => return false,
                }
            }
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_names_must_agree() {
        assert!(patterns_conflict("/:slug", "/:widgetID"));
        assert!(patterns_conflict("/a/:x", "/a/:y/b"));
        assert!(!patterns_conflict("/:widgetID/x", "/:widgetID"));
        assert!(!patterns_conflict("/count", "/:widgetID"));
        assert!(!patterns_conflict("/a/:x", "/b/:y"));
    }

    #[test]
    fn catch_all_only_matches_itself() {
        assert!(patterns_conflict("/*rest", "/:widgetID"));
        assert!(patterns_conflict("/files/*path", "/files/index"));
        assert!(!patterns_conflict("/files/*path", "/files/*path"));
        assert!(!patterns_conflict("/", "/*rest"));
    }

    #[test]
    fn joins_base_and_pattern() {
        assert_eq!(join("", "/x"), "/x");
        assert_eq!(join("/widgets", "/"), "/widgets");
        assert_eq!(join("/widgets", "/:widgetID"), "/widgets/:widgetID");
    }
}
