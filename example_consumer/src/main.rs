//! Example consumer: widgets with nested parts, served from memory.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

use axum::http::{request::Parts, Method};
use resource_sdk::{
    must_render_html_map, new_root_api, query_params, Api, ApiError, DefaultResource, FilterFn,
    HtmlRenderer, MemoryStorage, Patcher, Resource,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::net::TcpListener;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Widget {
    #[serde(flatten)]
    base: DefaultResource,
    #[serde(default)]
    name: String,
    #[serde(default)]
    color: String,
}

impl Resource for Widget {
    fn id(&self) -> String {
        self.base.id.to_string()
    }

    fn bind(&mut self, parts: &Parts) -> Result<(), ApiError> {
        self.base.bind(parts)?;
        if parts.method != Method::PATCH && self.name.is_empty() {
            return Err(ApiError::invalid_request("missing required name field"));
        }
        Ok(())
    }

    fn as_patcher(&mut self) -> Option<&mut dyn Patcher<Self>> {
        Some(self)
    }

    fn as_html(&self) -> Option<&dyn HtmlRenderer> {
        Some(self)
    }
}

impl Patcher<Widget> for Widget {
    fn patch(&mut self, patch: Widget) -> Result<(), ApiError> {
        if !patch.name.is_empty() {
            self.name = patch.name;
        }
        if !patch.color.is_empty() {
            self.color = patch.color;
        }
        Ok(())
    }
}

impl HtmlRenderer for Widget {
    fn html(&self, _parts: &Parts) -> String {
        must_render_html_map(None, templates(), "widget", self)
    }
}

fn templates() -> &'static HashMap<String, String> {
    static TEMPLATES: OnceLock<HashMap<String, String>> = OnceLock::new();
    TEMPLATES.get_or_init(|| {
        HashMap::from([
            (
                "layout".to_string(),
                "<html><body>{% block content %}{% endblock %}</body></html>".to_string(),
            ),
            (
                "widget".to_string(),
                "{% extends \"layout\" %}{% block content %}<h1>{{ name }}</h1><p>{{ color }}</p>{% endblock %}".to_string(),
            ),
        ])
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_sdk=info")),
        )
        .init();

    let widgets: Api<Widget> = Api::new("widget", "/widgets", MemoryStorage::new());
    widgets.set_get_all_filter(|parts| {
        let color = query_params(parts).get("color").cloned()?;
        Some(Arc::new(move |w: &Widget| w.color == color) as FilterFn<Widget>)
    });

    let parts: Api<DefaultResource> = Api::new("part", "/parts", MemoryStorage::new());
    widgets.add_nested_api(&parts)?;

    let root = new_root_api("api", "/api");
    root.add_nested_api(&widgets)?;
    root.add_custom_root_route(Method::GET, "/health", || async { "ok" })?;

    let app = root.router()?;
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
