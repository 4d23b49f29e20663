//! Template helpers for resources that implement [`HtmlRenderer`](crate::resource::HtmlRenderer).
//!
//! Templates are static configuration: a template that fails to render is a bug, so
//! these helpers panic instead of returning an error.

use minijinja::{Environment, Template};
use serde::Serialize;
use std::collections::HashMap;

/// Renders a parsed template with `data`.
///
/// # Panics
/// When rendering fails.
pub fn must_render_html<S: Serialize>(template: &Template<'_, '_>, data: S) -> String {
    match template.render(data) {
        Ok(html) => html,
        Err(err) => panic!("error rendering template {:?}: {:#}", template.name(), err),
    }
}

/// Adds every entry of `templates` to `base` (or a fresh environment) and renders
/// the template called `name`. Fragments can include or extend one another.
///
/// # Panics
/// When a template does not parse, `name` is missing, or rendering fails.
pub fn must_render_html_map<'s, S: Serialize>(
    base: Option<Environment<'s>>,
    templates: &'s HashMap<String, String>,
    name: &str,
    data: S,
) -> String {
    let mut env = base.unwrap_or_else(Environment::new);
    for (template_name, source) in templates {
        if let Err(err) = env.add_template(template_name, source) {
            panic!("error parsing template {:?}: {:#}", template_name, err);
        }
    }
    match env.get_template(name) {
        Ok(template) => must_render_html(&template, data),
        Err(err) => panic!("error finding template {:?}: {:#}", name, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_single_template() {
        let mut env = Environment::new();
        env.add_template("widget", "<p>{{ id }}</p>").unwrap();
        let tmpl = env.get_template("widget").unwrap();
        assert_eq!(must_render_html(&tmpl, json!({"id": "w1"})), "<p>w1</p>");
    }

    #[test]
    fn renders_named_entry_from_fragments() {
        let templates = HashMap::from([
            ("layout".to_string(), "<main>{% block body %}{% endblock %}</main>".to_string()),
            (
                "page".to_string(),
                "{% extends \"layout\" %}{% block body %}{{ title }}{% endblock %}".to_string(),
            ),
        ]);
        let html = must_render_html_map(None, &templates, "page", json!({"title": "Widgets"}));
        assert_eq!(html, "<main>Widgets</main>");
    }

    #[test]
    fn base_environment_is_kept() {
        let mut base = Environment::new();
        base.add_filter("shout", |s: String| s.to_uppercase());
        let templates = HashMap::from([("t".to_string(), "{{ name | shout }}".to_string())]);
        assert_eq!(must_render_html_map(Some(base), &templates, "t", json!({"name": "ok"})), "OK");
    }

    #[test]
    #[should_panic(expected = "error finding template")]
    fn missing_entry_point_panics() {
        let templates = HashMap::new();
        must_render_html_map(None, &templates, "nope", json!({}));
    }

    #[test]
    #[should_panic(expected = "error parsing template")]
    fn bad_syntax_panics() {
        let templates = HashMap::from([("t".to_string(), "{% if %}".to_string())]);
        must_render_html_map(None, &templates, "t", json!({}));
    }
}
