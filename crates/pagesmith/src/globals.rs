//! Standard globals available to every template.
//!
//! [`register_globals`] is run once at start-up and installs:
//!
//! | Name        | Call                          | Result                                    |
//! |-------------|-------------------------------|-------------------------------------------|
//! | `assetsUrl` | `assetsUrl("style.css")`      | `/style.css`                              |
//! | `route`     | `route("posts.show", {...})`  | whatever the [`UrlBuilder`] returns        |
//! | `style`     | `style("app")`                | `<link rel="stylesheet" href="/app.css" />` |
//! | `script`    | `script("app")`               | `<script type="text/javascript" src="/app.js"></script>` |
//!
//! `style` and `script` return safe markup, so they are not escaped under HTML
//! auto-escaping. Both accept a second, truthy argument to skip the suffix.
//!
//! Asset paths that are already absolute (`/...`) or full `http(s)://` URLs pass
//! through untouched. Relative paths get a leading `/`, or are joined onto the
//! `app.assetsUrl` base when the configuration sets one.

use std::sync::Arc;

use minijinja::{Error, ErrorKind, Value};
use tracing::debug;

use crate::binding::{Binding, HelperContext};
use crate::config::ConfigSource;
use crate::view::View;

/// Configuration key for an optional asset base URL (e.g. a CDN).
pub const ASSETS_URL_KEY: &str = "app.assetsUrl";

/// Builds URLs for named routes.
pub trait UrlBuilder: Send + Sync {
    /// URL for the route `name` with `params` (a map, or undefined when omitted).
    fn route_url(&self, name: &str, params: &Value) -> String;
}

impl<F> UrlBuilder for F
where
    F: Fn(&str, &Value) -> String + Send + Sync,
{
    fn route_url(&self, name: &str, params: &Value) -> String {
        (self)(name, params)
    }
}

/// Resolves an asset path against an optional base URL.
///
/// ```rust
/// use pagesmith::globals::assets_url;
///
/// assert_eq!(assets_url("", "style.css"), "/style.css");
/// assert_eq!(assets_url("", "/style.css"), "/style.css");
/// assert_eq!(assets_url("https://cdn.test/", "app.js"), "https://cdn.test/app.js");
/// assert_eq!(assets_url("https://cdn.test", "http://other/x.js"), "http://other/x.js");
/// ```
pub fn assets_url(base: &str, path: &str) -> String {
    if path.starts_with('/') || path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if base.is_empty() {
        format!("/{}", path)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }
}

fn with_suffix(path: String, suffix: &str, skip: bool) -> String {
    if skip || path.ends_with(suffix) {
        path
    } else {
        format!("{}{}", path, suffix)
    }
}

fn string_arg(args: &[Value], index: usize, helper: &str) -> Result<String, Error> {
    match args.get(index) {
        Some(value) if value.is_undefined() || value.is_none() => Err(missing(helper)),
        Some(value) => Ok(value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string())),
        None => Err(missing(helper)),
    }
}

fn missing(helper: &str) -> Error {
    Error::new(
        ErrorKind::MissingArgument,
        format!("{}() requires a path or name argument", helper),
    )
}

fn flag_arg(args: &[Value], index: usize) -> bool {
    args.get(index).is_some_and(Value::is_true)
}

/// Installs the standard globals on `view`.
///
/// `urls` builds named-route URLs; `config` supplies the optional
/// [`ASSETS_URL_KEY`] base.
pub fn register_globals<C>(view: &View, urls: Arc<dyn UrlBuilder>, config: &C)
where
    C: ConfigSource + ?Sized,
{
    let base: Arc<str> = config
        .get(ASSETS_URL_KEY)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
        .into();

    let assets_base = Arc::clone(&base);
    view.register_global(
        "assetsUrl",
        Binding::helper(move |_ctx: &HelperContext, args: &[Value]| {
            let path = string_arg(args, 0, "assetsUrl")?;
            Ok(Value::from(assets_url(&assets_base, &path)))
        }),
    );

    view.register_global(
        "route",
        Binding::helper(move |_ctx: &HelperContext, args: &[Value]| {
            let name = string_arg(args, 0, "route")?;
            let params = args.get(1).cloned().unwrap_or(Value::UNDEFINED);
            Ok(Value::from(urls.route_url(&name, &params)))
        }),
    );

    let style_base = Arc::clone(&base);
    view.register_global(
        "style",
        Binding::helper(move |_ctx: &HelperContext, args: &[Value]| {
            let path = with_suffix(string_arg(args, 0, "style")?, ".css", flag_arg(args, 1));
            Ok(Value::from_safe_string(format!(
                r#"<link rel="stylesheet" href="{}" />"#,
                assets_url(&style_base, &path)
            )))
        }),
    );

    let script_base = base;
    view.register_global(
        "script",
        Binding::helper(move |_ctx: &HelperContext, args: &[Value]| {
            let path = with_suffix(string_arg(args, 0, "script")?, ".js", flag_arg(args, 1));
            Ok(Value::from_safe_string(format!(
                r#"<script type="text/javascript" src="{}"></script>"#,
                assets_url(&script_base, &path)
            )))
        }),
    );

    debug!(names = ?view.global_names(), "registered standard globals");
}
