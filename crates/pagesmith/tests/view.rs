//! View facade behaviour: option capture, globals and render isolation.

use std::path::PathBuf;

use pagesmith::minijinja::Value;
use pagesmith::{AppPaths, ConfigSource, MapConfig, RequestView, View};
use serde_json::json;

fn app_paths() -> AppPaths {
    AppPaths::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests"))
}

#[test]
fn view_has_minijinja_engine() {
    let view = View::new(&app_paths(), &MapConfig::new());
    assert_eq!(view.engine_info().name(), "MiniJinja");
}

#[test]
fn options_set_in_config_are_normalised() {
    let config = MapConfig::new()
        .with("templating.pretty", true)
        .with("templating.cache", 1)
        .with("templating.doctype", "strict")
        .with("templating.self", "yes")
        .with("templating.debug", true)
        .with_filter("myFilter", |text, _| {
            Ok(Value::from(text.to_string().to_uppercase()))
        });

    let view = View::new(&app_paths(), &config);
    let options = view.options();

    assert!(options.pretty);
    assert!(options.cache);
    assert_eq!(options.doctype.as_deref(), Some("strict"));
    assert!(options.self_referencing);
    assert!(options.debug);
    assert!(options.filters.get("myFilter").is_some());
    assert_eq!(
        options.base_path,
        app_paths().app_root().join("resources").join("views")
    );
}

#[test]
fn configured_filter_is_usable_in_templates() {
    let config = MapConfig::new().with_filter("myFilter", |text, _| {
        Ok(Value::from(text.to_string().to_uppercase()))
    });
    let view = View::new(&app_paths(), &config);
    assert_eq!(view.render_string("{{ 'loud' | myFilter }}").unwrap(), "LOUD");
}

#[test]
fn options_from_yaml() {
    let config = MapConfig::from_yaml(
        r#"
templating:
  pretty: false
  cache: 0
  doctype: html
  debug: yes
"#,
    )
    .unwrap();
    assert_eq!(config.get("templating.debug"), Some(json!("yes")));

    let view = View::new(&app_paths(), &config);
    assert!(!view.options().pretty);
    assert!(!view.options().cache);
    assert!(view.options().debug);
    assert_eq!(view.template().resolve("doctype").as_str(), Some("html"));
}

#[test]
fn share_adds_to_locals_and_returns_template() {
    let view = View::new(&app_paths(), &MapConfig::new());
    let template = view.share([("myKey", "some-string")]);
    assert_eq!(template.locals().len(), 1);
    assert_eq!(template.resolve("myKey").as_str(), Some("some-string"));
}

#[test]
fn render_a_string() {
    let view = View::new(&app_paths(), &MapConfig::new());
    assert_eq!(
        view.render_string(r#"<a title="my-link">link</a>"#).unwrap(),
        r#"<a title="my-link">link</a>"#
    );
}

#[test]
fn render_a_template() {
    let view = View::new(&app_paths(), &MapConfig::new());
    assert_eq!(view.render("basic").unwrap(), r#"<a title="my-link">link</a>"#);
}

#[test]
fn independent_renders_do_not_leak_locals() {
    let view = View::new(&app_paths(), &MapConfig::new());
    let with_locals = view
        .render_with("locals", &json!({"myKey": "first"}))
        .unwrap();
    let without = view.render("locals").unwrap();
    assert_eq!(with_locals, r#"<a title="first">link</a>"#);
    assert_eq!(without, r#"<a title="">link</a>"#);
}

#[test]
fn globals_registered_later_reach_existing_templates() {
    let view = View::new(&app_paths(), &MapConfig::new());
    let template = view.template();
    view.register_global("appName", "pagesmith");
    assert_eq!(template.render_string("{{ appName }}").unwrap(), "pagesmith");
}

#[test]
fn request_views_are_isolated_per_request() {
    let view = std::sync::Arc::new(View::new(&app_paths(), &MapConfig::new()));

    let mut first = RequestView::new(view.clone());
    first.template().share([("myKey", "request-one")]);
    assert_eq!(
        first.template().render("locals").unwrap(),
        r#"<a title="request-one">link</a>"#
    );

    let mut second = RequestView::new(view);
    assert_eq!(
        second.template().render("locals").unwrap(),
        r#"<a title="">link</a>"#
    );
}
