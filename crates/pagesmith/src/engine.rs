//! Template engine abstraction.
//!
//! This module defines the [`TemplateEngine`] trait, the seam between the view
//! layer and the library that actually parses and executes templates. The view
//! layer treats the engine as a black box: given a template (file or source), a
//! root directory, a data namespace and the view options, it returns text.
//!
//! The bundled implementation is [`MiniJinjaEngine`].
//!
//! # Template References
//!
//! Views address file templates with dotted references. [`reference_to_path`]
//! turns `"subdir.template"` into `subdir/template`; the engine then tries each
//! of [`TEMPLATE_EXTENSIONS`] in order, and finally the bare path.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use minijinja::value::Rest;
use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use tracing::{debug, trace};

use crate::binding::{EngineInfo, Filter};
use crate::config::ViewOptions;
use crate::error::ViewError;

/// Recognized template file extensions, in lookup order.
pub const TEMPLATE_EXTENSIONS: &[&str] = &[".jinja", ".html", ".j2", ".njk", ".txt"];

/// The fully merged variables handed to the engine for one render.
pub type Namespace = BTreeMap<String, Value>;

/// Converts a dotted template reference into a relative path.
///
/// Every `.` is a directory separator; empty segments are dropped.
///
/// ```rust
/// use pagesmith::engine::reference_to_path;
/// use std::path::PathBuf;
///
/// assert_eq!(reference_to_path("subdir.template"), PathBuf::from("subdir/template"));
/// assert_eq!(reference_to_path("basic"), PathBuf::from("basic"));
/// ```
pub fn reference_to_path(reference: &str) -> PathBuf {
    reference.split('.').filter(|s| !s.is_empty()).collect()
}

/// Finds the file for a relative template path under `root`.
///
/// Returns the absolute path and the loader name (relative path with
/// extension, `/`-separated).
pub fn locate_template(root: &Path, template: &Path) -> Option<(PathBuf, String)> {
    let base = template
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    TEMPLATE_EXTENSIONS
        .iter()
        .map(|ext| format!("{}{}", base, ext))
        .chain(std::iter::once(base.clone()))
        .map(|name| (root.join(&name), name))
        .find(|(path, _)| path.is_file())
}

/// A template engine that can render files and sources with a namespace.
///
/// Engines are configured once by the view (`&mut self`) and then shared
/// read-only across renders, hence the `Send + Sync` bound.
pub trait TemplateEngine: Send + Sync {
    /// Identity exposed to helpers.
    fn info(&self) -> EngineInfo;

    /// Applies the view options. Called once, before the engine is shared.
    fn configure(&mut self, options: &ViewOptions);

    /// Registers a filter under `name`.
    fn add_filter(&mut self, name: &str, filter: Filter);

    /// Renders the file template at `template` (relative, no extension) under `root`.
    fn render_file(
        &self,
        template: &Path,
        root: &Path,
        namespace: Namespace,
        options: &ViewOptions,
    ) -> Result<String, ViewError>;

    /// Renders literal template source.
    ///
    /// `root` is the calling template's lookup root. The MiniJinja engine resolves
    /// includes through its configured loader instead.
    fn render_source(
        &self,
        source: &str,
        root: &Path,
        namespace: Namespace,
        options: &ViewOptions,
    ) -> Result<String, ViewError>;

    /// Marks a string as safe so auto-escaping leaves it untouched.
    fn mark_safe(&self, raw: &str) -> Value;
}

/// MiniJinja-based template engine.
///
/// Option mapping:
///
/// - `pretty = false` turns on `trim_blocks` and `lstrip_blocks`; `pretty = true`
///   keeps block whitespace and the trailing newline as written
/// - `cache = true` compiles file templates once through a path loader rooted at
///   the configured base path; otherwise files are re-read on every render
/// - a `doctype` forces HTML auto-escaping for every template; without one,
///   escaping follows the file extension (`.html`, `.htm`, `.xml`)
/// - `self_referencing` exposes the namespace as a single `self` variable
/// - `debug` enables MiniJinja's debug mode
///
/// Undefined variables, and attribute chains on them, render as the empty string.
///
/// # Example
///
/// ```rust
/// use pagesmith::engine::{MiniJinjaEngine, Namespace, TemplateEngine};
/// use pagesmith::ViewOptions;
/// use minijinja::Value;
/// use std::path::Path;
///
/// let options = ViewOptions::new("/nonexistent");
/// let mut engine = MiniJinjaEngine::new();
/// engine.configure(&options);
///
/// let mut ns = Namespace::new();
/// ns.insert("name".into(), Value::from("World"));
/// let out = engine
///     .render_source("Hello, {{ name }}!", Path::new("/nonexistent"), ns, &options)
///     .unwrap();
/// assert_eq!(out, "Hello, World!");
/// ```
pub struct MiniJinjaEngine {
    env: Environment<'static>,
    loader_root: Option<PathBuf>,
}

impl MiniJinjaEngine {
    /// Identity of this engine.
    pub const INFO: EngineInfo = EngineInfo::new("MiniJinja");

    /// Creates an unconfigured engine.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        Self {
            env,
            loader_root: None,
        }
    }

    /// The environment templates are compiled and cached in.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Mutable environment access for extra tests, functions or filters.
    ///
    /// Changes must happen before the engine is passed to
    /// [`View::from_options_with_engine`](crate::View::from_options_with_engine);
    /// the view owns it afterwards.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    fn context(namespace: Namespace, options: &ViewOptions) -> Value {
        let ns = Value::from(namespace);
        if options.self_referencing {
            let mut wrapped = BTreeMap::new();
            wrapped.insert("self".to_string(), ns);
            Value::from(wrapped)
        } else {
            ns
        }
    }

    fn uses_loader(&self, root: &Path) -> bool {
        self.loader_root.as_deref() == Some(root)
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn info(&self) -> EngineInfo {
        Self::INFO
    }

    fn configure(&mut self, options: &ViewOptions) {
        self.env.set_trim_blocks(!options.pretty);
        self.env.set_lstrip_blocks(!options.pretty);
        self.env.set_keep_trailing_newline(options.pretty);
        self.env.set_debug(options.debug);

        if options.doctype.is_some() {
            self.env.set_auto_escape_callback(|_| AutoEscape::Html);
        } else {
            self.env
                .set_auto_escape_callback(minijinja::default_auto_escape_callback);
        }

        self.env
            .set_loader(minijinja::path_loader(options.base_path.clone()));
        self.loader_root = Some(options.base_path.clone());

        for (name, filter) in options.filters.iter() {
            self.add_filter(name, filter.clone());
        }

        debug!(
            root = %options.base_path.display(),
            filters = options.filters.len(),
            "configured MiniJinja engine"
        );
    }

    fn add_filter(&mut self, name: &str, filter: Filter) {
        self.env.add_filter(
            name.to_string(),
            move |value: Value, args: Rest<Value>| filter.apply(&value, &args.0),
        );
    }

    fn render_file(
        &self,
        template: &Path,
        root: &Path,
        namespace: Namespace,
        options: &ViewOptions,
    ) -> Result<String, ViewError> {
        let (path, name) =
            locate_template(root, template).ok_or_else(|| ViewError::TemplateNotFound {
                reference: template.display().to_string(),
                root: root.to_path_buf(),
            })?;
        let ctx = Self::context(namespace, options);

        if options.cache && self.uses_loader(root) {
            trace!(template = %name, "rendering through loader cache");
            let tmpl = self.env.get_template(&name)?;
            return Ok(tmpl.render(ctx)?);
        }

        trace!(path = %path.display(), "reading template from disk");
        let source = fs::read_to_string(&path).map_err(|source| ViewError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(self.env.render_named_str(&name, &source, ctx)?)
    }

    fn render_source(
        &self,
        source: &str,
        _root: &Path,
        namespace: Namespace,
        options: &ViewOptions,
    ) -> Result<String, ViewError> {
        let ctx = Self::context(namespace, options);
        Ok(self.env.render_str(source, ctx)?)
    }

    fn mark_safe(&self, raw: &str) -> Value {
        Value::from_safe_string(raw.to_string())
    }
}
