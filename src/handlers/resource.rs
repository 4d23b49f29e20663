//! Resource CRUD handlers: create, read, list, replace, patch, delete, plus the
//! existence check guarding everything under `/:<name>ID`.

use crate::api::Api;
use crate::error::ApiError;
use crate::extractors::body::get_from_request;
use crate::extractors::id::{decode_segment, PathIds};
use crate::resource::Resource;
use crate::response::Reply;
use axum::{
    body::Body,
    extract::{RawPathParams, Request, State},
    http::{request::Parts, Method, StatusCode},
    middleware::Next,
    response::Response,
};

pub(crate) async fn create<T: Resource>(api: Api<T>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let result = create_resource(&api, &parts, body).await;
    api.finish(&parts, result)
}

pub(crate) async fn read<T: Resource>(api: Api<T>, req: Request) -> Response {
    let (parts, _) = req.into_parts();
    let result = read_resource(&api, &parts).await;
    api.finish(&parts, result)
}

pub(crate) async fn list<T: Resource>(api: Api<T>, req: Request) -> Response {
    let (parts, _) = req.into_parts();
    let result = list_resources(&api, &parts).await;
    api.finish(&parts, result)
}

pub(crate) async fn replace<T: Resource>(api: Api<T>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let result = replace_resource(&api, &parts, body).await;
    api.finish(&parts, result)
}

pub(crate) async fn patch<T: Resource>(api: Api<T>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let result = patch_resource(&api, &parts, body).await;
    api.finish(&parts, result)
}

pub(crate) async fn delete<T: Resource>(api: Api<T>, req: Request) -> Response {
    let (parts, _) = req.into_parts();
    let result = delete_resource(&api, &parts).await;
    api.finish(&parts, result)
}

async fn create_resource<T: Resource>(api: &Api<T>, parts: &Parts, body: Body) -> Result<Reply, ApiError> {
    let resource: T = get_from_request(parts, body).await?;
    let resource = store(api, parts, resource).await?;
    Ok(Reply::Content {
        status: api.status_for(&Method::POST, StatusCode::CREATED),
        body: api.wrap_one(resource),
    })
}

async fn read_resource<T: Resource>(api: &Api<T>, parts: &Parts) -> Result<Reply, ApiError> {
    let resource = api.get_requested_resource(parts).await?;
    Ok(Reply::Content {
        status: api.status_for(&Method::GET, StatusCode::OK),
        body: api.wrap_one(resource),
    })
}

async fn list_resources<T: Resource>(api: &Api<T>, parts: &Parts) -> Result<Reply, ApiError> {
    let filter = api.get_all_filter(parts);
    let resources = api.storage().get_all(filter).await.map_err(|err| {
        tracing::error!(api = %api.name(), error = %err, "error getting resources");
        ApiError::internal(err)
    })?;
    tracing::debug!(api = %api.name(), count = resources.len(), "responding with resources");
    Ok(Reply::Content {
        status: api.status_for(&Method::GET, StatusCode::OK),
        body: api.wrap_all(resources),
    })
}

async fn replace_resource<T: Resource>(api: &Api<T>, parts: &Parts, body: Body) -> Result<Reply, ApiError> {
    let resource: T = get_from_request(parts, body).await?;
    if resource.id() != api.get_id_param(parts) {
        return Err(ApiError::invalid_request("id must match URL path"));
    }
    let resource = store(api, parts, resource).await?;
    Ok(Reply::Content {
        status: api.status_for(&Method::PUT, StatusCode::OK),
        body: api.wrap_one(resource),
    })
}

/// Patch support is checked on the stored resource before the body is read.
async fn patch_resource<T: Resource>(api: &Api<T>, parts: &Parts, body: Body) -> Result<Reply, ApiError> {
    let mut resource = api.get_requested_resource(parts).await?;
    if resource.as_patcher().is_none() {
        return Err(ApiError::MethodNotAllowed);
    }
    let patch_request: T = get_from_request(parts, body).await?;
    {
        let patcher = resource.as_patcher().ok_or(ApiError::MethodNotAllowed)?;
        patcher.patch(patch_request).map_err(|err| {
            tracing::error!(api = %api.name(), error = %err, "error patching resource");
            err
        })?;
    }
    let resource = store(api, parts, resource).await?;
    Ok(Reply::Content {
        status: api.status_for(&Method::PATCH, StatusCode::OK),
        body: api.wrap_one(resource),
    })
}

async fn delete_resource<T: Resource>(api: &Api<T>, parts: &Parts) -> Result<Reply, ApiError> {
    api.before_delete(parts).map_err(|err| {
        tracing::error!(api = %api.name(), error = %err, "error executing before delete hook");
        err
    })?;

    let id = api.get_id_param(parts);
    tracing::info!(api = %api.name(), id = %id, "deleting resource");
    api.storage().delete(&id).await.map_err(|err| {
        tracing::error!(api = %api.name(), id = %id, error = %err, "error deleting resource");
        ApiError::from(err)
    })?;

    api.after_delete(parts).map_err(|err| {
        tracing::error!(api = %api.name(), error = %err, "error executing after delete hook");
        err
    })?;

    Ok(match api.status_override(&Method::DELETE) {
        Some(status) => Reply::Empty(status),
        None => Reply::no_content(),
    })
}

/// Runs the create/update hook, then persists. The hook failing means nothing is stored.
async fn store<T: Resource>(api: &Api<T>, parts: &Parts, resource: T) -> Result<T, ApiError> {
    api.on_create_or_update(parts, &resource)?;
    tracing::info!(api = %api.name(), id = %resource.id(), "storing resource");
    api.storage().set(resource.clone()).await.map_err(|err| {
        tracing::error!(api = %api.name(), error = %err, "error storing resource");
        ApiError::internal(err)
    })?;
    Ok(resource)
}

/// Records the matched path parameters, percent-decoded, then requires the addressed resource to exist.
pub(crate) async fn resource_exists<T: Resource>(
    State(api): State<Api<T>>,
    params: RawPathParams,
    mut req: Request,
    next: Next,
) -> Response {
    let mut ids = req.extensions().get::<PathIds>().cloned().unwrap_or_default();
    for (key, value) in params.iter() {
        ids.0.insert(key.to_string(), decode_segment(value));
    }
    req.extensions_mut().insert(ids);

    with_requested_resource(&api, req, next, |_, _| Ok(())).await
}

/// Fetches the addressed resource and hands it to `f` before calling `next`. A PUT
/// that addresses this level's resource directly is let through when it does not
/// exist yet, so it can create it.
pub(crate) async fn with_requested_resource<T, F>(
    api: &Api<T>,
    req: Request,
    next: Next,
    f: F,
) -> Response
where
    T: Resource,
    F: FnOnce(&mut Request, T) -> Result<(), ApiError>,
{
    let (parts, body) = req.into_parts();
    match api.get_requested_resource(&parts).await {
        Ok(resource) => {
            let mut req = Request::from_parts(parts, body);
            match f(&mut req, resource) {
                Ok(()) => next.run(req).await,
                Err(err) => {
                    let (parts, _) = req.into_parts();
                    api.finish(&parts, Err(err))
                }
            }
        }
        Err(ApiError::NotFound) if parts.method == Method::PUT && addresses_self(&parts) => {
            tracing::warn!(api = %api.name(), "resource not found but continuing to next handler");
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => api.finish(&parts, Err(err)),
    }
}

/// Inside the id scope the matched prefix is stripped, so only the resource itself
/// leaves an empty path.
fn addresses_self(parts: &Parts) -> bool {
    parts.uri.path().trim_matches('/').is_empty()
}
