//! Configuration capture and the collaborator services it reads from.
//!
//! A [`View`](crate::View) reads its options exactly once, at construction, from
//! two services supplied by the host application:
//!
//! - a [`PathSource`], which knows where template files live
//! - a [`ConfigSource`], a key/value store read under the [`CONFIG_PREFIX`] namespace
//!
//! The result is a [`ViewOptions`] snapshot. It has a fixed shape with documented
//! defaults, so a misspelled option name is a compile error rather than a silently
//! ignored key. To change an option, build a new view.
//!
//! | Key                    | Field              | Default |
//! |------------------------|--------------------|---------|
//! | `templating.pretty`    | `pretty`           | `false` |
//! | `templating.cache`     | `cache`            | `false` |
//! | `templating.doctype`   | `doctype`          | `None`  |
//! | `templating.filters`   | `filters`          | empty   |
//! | `templating.self`      | `self_referencing` | `false` |
//! | `templating.debug`     | `debug`            | `false` |
//!
//! Boolean options accept any value and are normalised with [`is_truthy`], so
//! `cache: 1` and `self: "yes"` both enable their option.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use minijinja::Value;
use serde_json::Value as JsonValue;

use crate::binding::{Filter, Filters};

/// Key namespace for all view options.
pub const CONFIG_PREFIX: &str = "templating";

/// Supplies the directory templates are looked up in.
pub trait PathSource {
    /// Absolute root directory of the template files.
    fn views_path(&self) -> PathBuf;
}

impl PathSource for PathBuf {
    fn views_path(&self) -> PathBuf {
        self.clone()
    }
}

impl PathSource for Path {
    fn views_path(&self) -> PathBuf {
        self.to_path_buf()
    }
}

/// Conventional application layout: templates live in `<root>/resources/views`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    /// Creates paths for an application rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The application root.
    pub fn app_root(&self) -> &Path {
        &self.root
    }
}

impl PathSource for AppPaths {
    fn views_path(&self) -> PathBuf {
        self.root.join("resources").join("views")
    }
}

/// Read access to the host application's configuration.
pub trait ConfigSource {
    /// Returns the value stored under a dotted key, if any.
    fn get(&self, key: &str) -> Option<JsonValue>;

    /// Returns the filter table stored under a dotted key, if any.
    ///
    /// Filters are functions and cannot travel as JSON, so they have their own
    /// accessor. Sources without filter support keep the default.
    fn filters(&self, _key: &str) -> Option<Filters> {
        None
    }

    /// Returns the value under `key`, or `default` when absent.
    fn get_or(&self, key: &str, default: JsonValue) -> JsonValue {
        self.get(key).unwrap_or(default)
    }
}

/// Truthiness of a configuration value.
///
/// `null`, `false`, `0` and `""` are false; everything else is true, including
/// the string `"no"` and empty arrays or objects.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

/// In-memory [`ConfigSource`] keyed by dotted paths.
///
/// # Example
///
/// ```rust
/// use pagesmith::{ConfigSource, MapConfig};
///
/// let config = MapConfig::from_yaml("templating:\n  pretty: true\n  cache: 1\n").unwrap();
/// assert_eq!(config.get("templating.pretty"), Some(serde_json::json!(true)));
/// assert_eq!(config.get("templating.cache"), Some(serde_json::json!(1)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: BTreeMap<String, JsonValue>,
    filters: BTreeMap<String, Filters>,
}

impl MapConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses YAML, flattening nested maps into dotted keys.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let root: JsonValue = serde_yaml::from_str(yaml)?;
        let mut config = Self::new();
        flatten_into(&mut config.values, String::new(), root);
        Ok(config)
    }

    /// Sets a value under a dotted key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets the whole filter table stored under `key`.
    pub fn set_filters(&mut self, key: impl Into<String>, filters: Filters) -> &mut Self {
        self.filters.insert(key.into(), filters);
        self
    }

    /// Adds one filter to the view filter table (`templating.filters`).
    pub fn with_filter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, minijinja::Error> + Send + Sync + 'static,
    {
        self.filters
            .entry(option_key("filters"))
            .or_default()
            .insert(name, Filter::new(f));
        self
    }
}

impl ConfigSource for MapConfig {
    fn get(&self, key: &str) -> Option<JsonValue> {
        self.values.get(key).cloned()
    }

    fn filters(&self, key: &str) -> Option<Filters> {
        self.filters.get(key).cloned()
    }
}

fn flatten_into(out: &mut BTreeMap<String, JsonValue>, prefix: String, value: JsonValue) {
    match value {
        JsonValue::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(out, path, child);
            }
        }
        other if !prefix.is_empty() => {
            out.insert(prefix, other);
        }
        _ => {}
    }
}

fn option_key(name: &str) -> String {
    format!("{}.{}", CONFIG_PREFIX, name)
}

/// Immutable snapshot of the view options.
///
/// Shared by `Arc` between a view, its templates and its engine.
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    /// Root directory for template lookups (exposed to templates as `basedir`).
    pub base_path: PathBuf,
    /// Keep template whitespace as written.
    pub pretty: bool,
    /// Compile file templates once and reuse them.
    pub cache: bool,
    /// Output document type; when set, all output is HTML-escaped.
    pub doctype: Option<String>,
    /// Filters registered with the engine.
    pub filters: Filters,
    /// Expose the render namespace under a single `self` variable.
    pub self_referencing: bool,
    /// Engine debug mode.
    pub debug: bool,
}

impl ViewOptions {
    /// Options with every default and the given template root.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Reads the options from the host services, applying defaults.
    pub fn from_sources<P, C>(paths: &P, config: &C) -> Self
    where
        P: PathSource + ?Sized,
        C: ConfigSource + ?Sized,
    {
        let flag = |name: &str| config.get(&option_key(name)).is_some_and(|v| is_truthy(&v));

        let doctype = config
            .get(&option_key("doctype"))
            .filter(is_truthy)
            .map(|v| match v {
                JsonValue::String(s) => s,
                other => other.to_string(),
            });

        Self {
            base_path: paths.views_path(),
            pretty: flag("pretty"),
            cache: flag("cache"),
            doctype,
            filters: config.filters(&option_key("filters")).unwrap_or_default(),
            self_referencing: flag("self"),
            debug: flag("debug"),
        }
    }

    /// Looks up an option by the name templates see it under.
    ///
    /// Names are `basedir`, `pretty`, `cache`, `doctype`, `filters`, `self` and
    /// `debug`. An unset `doctype` counts as absent. `filters` resolves to the
    /// list of registered filter names.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "basedir" => Some(Value::from(self.base_path.to_string_lossy().into_owned())),
            "pretty" => Some(Value::from(self.pretty)),
            "cache" => Some(Value::from(self.cache)),
            "doctype" => self.doctype.as_deref().map(Value::from),
            "filters" => Some(Value::from(
                self.filters.names().map(Value::from).collect::<Vec<_>>(),
            )),
            "self" => Some(Value::from(self.self_referencing)),
            "debug" => Some(Value::from(self.debug)),
            _ => None,
        }
    }

    /// All options visible to templates, as `(name, value)` pairs.
    pub fn exposed(&self) -> Vec<(&'static str, Value)> {
        ["basedir", "pretty", "cache", "doctype", "filters", "self", "debug"]
            .into_iter()
            .filter_map(|name| self.lookup(name).map(|value| (name, value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));

        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!(-2.5)));
        assert!(is_truthy(&json!("no")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn defaults_when_config_is_empty() {
        let options = ViewOptions::from_sources(&PathBuf::from("/views"), &MapConfig::new());

        assert_eq!(options.base_path, PathBuf::from("/views"));
        assert!(!options.pretty);
        assert!(!options.cache);
        assert_eq!(options.doctype, None);
        assert!(options.filters.is_empty());
        assert!(!options.self_referencing);
        assert!(!options.debug);
    }

    #[test]
    fn booleans_are_normalised() {
        let config = MapConfig::new()
            .with("templating.pretty", true)
            .with("templating.cache", 1)
            .with("templating.doctype", "strict")
            .with("templating.self", "yes")
            .with("templating.debug", true)
            .with_filter("myFilter", |v, _| Ok(Value::from(v.to_string().to_uppercase())));

        let options = ViewOptions::from_sources(&PathBuf::from("/views"), &config);

        assert!(options.pretty);
        assert!(options.cache);
        assert_eq!(options.doctype.as_deref(), Some("strict"));
        assert!(options.self_referencing);
        assert!(options.debug);

        let filter = options.filters.get("myFilter").expect("filter registered");
        assert_eq!(
            filter.apply(&Value::from("abc"), &[]).unwrap(),
            Value::from("ABC")
        );
    }

    #[test]
    fn falsy_values_disable_options() {
        let config = MapConfig::new()
            .with("templating.pretty", 0)
            .with("templating.cache", "")
            .with("templating.doctype", "")
            .with("templating.debug", JsonValue::Null);

        let options = ViewOptions::from_sources(&PathBuf::from("/views"), &config);
        assert!(!options.pretty);
        assert!(!options.cache);
        assert_eq!(options.doctype, None);
        assert!(!options.debug);
    }

    #[test]
    fn non_string_doctype_uses_json_text() {
        let config = MapConfig::new().with("templating.doctype", 5);
        let options = ViewOptions::from_sources(&PathBuf::from("/views"), &config);
        assert_eq!(options.doctype.as_deref(), Some("5"));
    }

    #[test]
    fn app_paths_views_dir() {
        let paths = AppPaths::new("/srv/app");
        assert_eq!(paths.app_root(), Path::new("/srv/app"));
        assert_eq!(paths.views_path(), PathBuf::from("/srv/app/resources/views"));
    }

    #[test]
    fn yaml_flattens_to_dotted_keys() {
        let config = MapConfig::from_yaml(
            "templating:\n  pretty: true\n  doctype: html\napp:\n  assetsUrl: https://cdn.test\n",
        )
        .unwrap();

        assert_eq!(config.get("templating.pretty"), Some(json!(true)));
        assert_eq!(config.get("templating.doctype"), Some(json!("html")));
        assert_eq!(config.get("app.assetsUrl"), Some(json!("https://cdn.test")));
        assert_eq!(config.get("templating"), None);
        assert_eq!(config.get_or("templating.cache", json!(false)), json!(false));
    }

    #[test]
    fn lookup_uses_template_names() {
        let mut options = ViewOptions::new("/views");
        options.pretty = true;
        options.filters = Filters::new().with("f", |v, _| Ok(v.clone()));

        assert_eq!(options.lookup("basedir"), Some(Value::from("/views")));
        assert_eq!(options.lookup("pretty"), Some(Value::from(true)));
        assert_eq!(options.lookup("self"), Some(Value::from(false)));
        assert_eq!(options.lookup("doctype"), None);
        assert_eq!(options.lookup("filters").map(|v| v.len()), Some(Some(1)));
        assert_eq!(options.lookup("self_referencing"), None);
        assert_eq!(options.lookup("nothing"), None);

        let names: Vec<_> = options.exposed().into_iter().map(|(n, _)| n).collect();
        assert!(!names.contains(&"doctype"));
        assert!(names.contains(&"basedir"));
    }
}
