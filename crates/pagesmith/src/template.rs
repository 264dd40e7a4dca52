//! The per-render template context.
//!
//! A [`Template`] is created by a [`View`](crate::View) for one logical render
//! (typically one request). It layers three sources of variables into a single
//! namespace:
//!
//! 1. Locals, shared explicitly on this template with [`Template::share`]
//! 2. View options, under the names `basedir`, `pretty`, `cache`, `doctype`,
//!    `filters`, `self` and `debug`
//! 3. Globals, registered process-wide on the view
//!
//! Earlier sources win. A name found nowhere resolves to the empty string, so a
//! missing optional variable renders blank instead of failing the page.
//!
//! # Globals Are Live
//!
//! Templates hold a shared reference to the view's globals, not a copy. A global
//! registered after a template was created is visible to that template. Register
//! globals during start-up; the lock only keeps late registration memory-safe.
//!
//! # Isolation
//!
//! Locals belong to one template. Do not share a template between unrelated
//! requests; create a fresh one per render with [`View::template`](crate::View::template).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use minijinja::{Error, Value};
use serde::Serialize;
use tracing::{debug, trace};

use crate::binding::{Binding, Bindings, EngineInfo, HelperContext};
use crate::config::ViewOptions;
use crate::engine::{reference_to_path, Namespace, TemplateEngine};
use crate::error::ViewError;

/// Globals mapping shared between a view and every template it creates.
pub type SharedGlobals = Arc<RwLock<Bindings>>;

pub(crate) fn read_globals(globals: &RwLock<Bindings>) -> RwLockReadGuard<'_, Bindings> {
    globals.read().unwrap_or_else(PoisonError::into_inner)
}

/// Variables and engine access for a single render.
///
/// # Example
///
/// ```rust
/// use pagesmith::{MapConfig, View};
/// use std::path::PathBuf;
///
/// let view = View::new(&PathBuf::from("/nonexistent"), &MapConfig::new());
/// let mut template = view.template();
/// template.share([("user", "Ada")]);
///
/// assert_eq!(template.resolve("user").as_str(), Some("Ada"));
/// assert_eq!(template.resolve("cache"), minijinja::Value::from(false));
/// assert_eq!(template.resolve("missing").as_str(), Some(""));
/// assert_eq!(template.render_string("Hi {{ user }}").unwrap(), "Hi Ada");
/// ```
pub struct Template {
    engine: Arc<dyn TemplateEngine>,
    base_path: PathBuf,
    options: Arc<ViewOptions>,
    globals: SharedGlobals,
    locals: Bindings,
}

impl Template {
    /// Creates a template bound to an engine, options and a live globals mapping.
    ///
    /// The lookup root defaults to the configured base path.
    pub fn new(
        engine: Arc<dyn TemplateEngine>,
        options: Arc<ViewOptions>,
        globals: SharedGlobals,
    ) -> Self {
        Self {
            engine,
            base_path: options.base_path.clone(),
            options,
            globals,
            locals: Bindings::new(),
        }
    }

    /// Overrides the lookup root for this template only. May be empty.
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Root directory file references are resolved against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// The view options this template renders with.
    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Identity of the engine this template renders with.
    pub fn engine_info(&self) -> EngineInfo {
        self.engine.info()
    }

    /// The locals shared so far.
    pub fn locals(&self) -> &Bindings {
        &self.locals
    }

    /// A single local, unbound.
    pub fn local(&self, name: &str) -> Option<&Binding> {
        self.locals.get(name)
    }

    /// Merges entries into the locals. Later keys overwrite earlier ones.
    pub fn share<I, K, V>(&mut self, locals: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Binding>,
    {
        for (key, value) in locals {
            self.locals.insert(key.into(), value.into());
        }
        self
    }

    /// Shares a helper function as a local.
    pub fn share_helper<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&HelperContext, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.locals.insert(name.into(), Binding::helper(f));
        self
    }

    /// Merges the top-level fields of serializable data into the locals.
    ///
    /// # Errors
    ///
    /// Fails if the data does not serialize, or serializes to something other
    /// than a map (a struct or map is expected).
    pub fn share_serialize<T>(&mut self, data: &T) -> Result<&mut Self, ViewError>
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(data)? {
            serde_json::Value::Object(map) => {
                for (key, value) in map {
                    self.locals.insert(key, Binding::from(value));
                }
                Ok(self)
            }
            other => Err(ViewError::LocalsNotAMap {
                kind: json_kind(&other),
            }),
        }
    }

    fn helper_context(&self) -> HelperContext {
        HelperContext::new(self.engine.info())
    }

    /// Looks up a variable: locals, then options, then globals.
    ///
    /// Helpers come back as callable values bound to this engine's
    /// [`HelperContext`]. Unknown names resolve to the empty string.
    pub fn resolve(&self, name: &str) -> Value {
        let ctx = self.helper_context();

        if let Some(binding) = self.locals.get(name) {
            trace!(name, tier = "locals", "resolved variable");
            return binding.bind(&ctx);
        }
        if let Some(value) = self.options.lookup(name) {
            trace!(name, tier = "options", "resolved variable");
            return value;
        }
        if let Some(binding) = read_globals(&self.globals).get(name) {
            trace!(name, tier = "globals", "resolved variable");
            return binding.bind(&ctx);
        }

        trace!(name, "unresolved variable, using empty string");
        Value::from("")
    }

    /// Returns `raw` unchanged, marked so auto-escaping leaves it alone.
    pub fn safe(&self, raw: &str) -> Value {
        self.engine.mark_safe(raw)
    }

    /// The merged namespace a render would receive right now.
    ///
    /// Globals are laid down first, then options, then locals, so a name present
    /// in several tiers ends up with the same value [`resolve`](Self::resolve)
    /// returns.
    pub fn namespace(&self) -> Namespace {
        let ctx = self.helper_context();
        let mut ns: Namespace = read_globals(&self.globals)
            .iter()
            .map(|(name, binding)| (name.clone(), binding.bind(&ctx)))
            .collect();

        for (name, value) in self.options.exposed() {
            ns.insert(name.to_string(), value);
        }
        for (name, binding) in &self.locals {
            ns.insert(name.clone(), binding.bind(&ctx));
        }
        ns
    }

    /// Renders the file template named by a dotted reference.
    ///
    /// `"subdir.template"` resolves to `subdir/template` under the base path,
    /// with the engine's default extensions.
    pub fn render(&self, reference: &str) -> Result<String, ViewError> {
        let path = reference_to_path(reference);
        let ns = self.namespace();
        debug!(
            reference,
            root = %self.base_path.display(),
            vars = ns.len(),
            "rendering template"
        );
        self.engine
            .render_file(&path, &self.base_path, ns, &self.options)
    }

    /// Merges `locals` into this template, then renders `reference`.
    pub fn render_with<T>(&mut self, reference: &str, locals: &T) -> Result<String, ViewError>
    where
        T: Serialize + ?Sized,
    {
        self.share_serialize(locals)?;
        self.render(reference)
    }

    /// Renders literal template source.
    pub fn render_string(&self, source: &str) -> Result<String, ViewError> {
        let ns = self.namespace();
        debug!(len = source.len(), vars = ns.len(), "rendering template source");
        self.engine
            .render_source(source, &self.base_path, ns, &self.options)
    }

    /// Merges `locals` into this template, then renders `source`.
    pub fn render_string_with<T>(&mut self, source: &str, locals: &T) -> Result<String, ViewError>
    where
        T: Serialize + ?Sized,
    {
        self.share_serialize(locals)?;
        self.render_string(source)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("engine", &self.engine.info())
            .field("base_path", &self.base_path)
            .field("locals", &self.locals.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
