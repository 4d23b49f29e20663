//! Building blocks for custom handlers and middleware that work on this API's resource.

use super::resource::with_requested_resource;
use crate::api::Api;
use crate::error::ApiError;
use crate::extractors::body::get_from_request;
use crate::resource::Resource;
use crate::response::{RenderDispatch, Reply};
use axum::{
    body::Body,
    extract::Request,
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by the generated handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

impl<T: Resource> Api<T> {
    /// Decodes and binds `T` from the request, or takes it from the request extensions.
    pub async fn get_from_request(&self, parts: &Parts, body: Body) -> Result<T, ApiError> {
        get_from_request(parts, body).await
    }

    /// Handler that fetches the addressed resource and passes it to `f`. Meant for
    /// custom ID routes.
    pub fn get_requested_resource_and_do<F, Fut>(
        &self,
        f: F,
    ) -> impl Fn(Request) -> HandlerFuture + Clone + Send + Sync + 'static
    where
        F: Fn(Parts, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, ApiError>> + Send + 'static,
    {
        let api = self.clone();
        let f = Arc::new(f);
        move |req: Request| {
            let api = api.clone();
            let f = f.clone();
            Box::pin(async move {
                let (parts, _) = req.into_parts();
                let result = match api.get_requested_resource(&parts).await {
                    Ok(resource) => f(parts.clone(), resource).await,
                    Err(err) => Err(err),
                };
                api.finish(&parts, result)
            }) as HandlerFuture
        }
    }

    /// Handler that decodes the body into `T` and passes it to `f`. `Ok(None)` renders
    /// an empty 204.
    pub fn read_request_body_and_do<F, Fut>(
        &self,
        f: F,
    ) -> impl Fn(Request) -> HandlerFuture + Clone + Send + Sync + 'static
    where
        F: Fn(Parts, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, ApiError>> + Send + 'static,
    {
        let api = self.clone();
        read_request_body_and_do(move |parts: Parts, resource: T| {
            let fut = f(parts, resource);
            let api = api.clone();
            async move { fut.await.map(|out| out.map(|r| api.wrap_one(r))) }
        })
    }

    /// ID-scope middleware that hands the addressed resource to `f` before the inner
    /// handler runs. `f` may stash values in the request extensions; an error stops
    /// the request.
    pub fn add_requested_resource_middleware<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, T) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        let api = self.clone();
        let f = Arc::new(f);
        self.add_id_middleware(axum::middleware::from_fn(move |req: Request, next: Next| {
            let api = api.clone();
            let f = f.clone();
            async move { with_requested_resource(&api, req, next, |req, r| f(req, r)).await }
        }))
    }
}

/// Handler that decodes the body into `T` and passes it to `f`, for routes outside
/// any API. `Ok(Some(body))` renders 200, `Ok(None)` an empty 204.
pub fn read_request_body_and_do<T, R, F, Fut>(
    f: F,
) -> impl Fn(Request) -> HandlerFuture + Clone + Send + Sync + 'static
where
    T: Resource,
    R: crate::response::Render + 'static,
    F: Fn(Parts, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<R>, ApiError>> + Send + 'static,
{
    let f = Arc::new(f);
    move |req: Request| {
        let f = f.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let result = match get_from_request::<T>(&parts, body).await {
                Ok(resource) => f(parts.clone(), resource).await.map(|out| match out {
                    Some(body) => Reply::ok(body),
                    None => Reply::no_content(),
                }),
                Err(err) => Err(err),
            };
            RenderDispatch::from_parts(&parts).handle(&parts, result)
        }) as HandlerFuture
    }
}
