//! The process-wide view facade.
//!
//! [`View`] owns the resolved options, the engine and the globals mapping. It is
//! built once at start-up and shared (typically behind an `Arc`) by every request
//! handler. Each render goes through a fresh [`Template`], so locals never leak
//! from one render into the next.
//!
//! Request layers that only need "something that renders" can depend on the
//! [`ViewProvider`] capability instead of the concrete facade, and use
//! [`RequestView`] to attach one lazily created template to each request.

use std::fmt;
use std::sync::{Arc, PoisonError};

use minijinja::{Error, Value};
use serde::Serialize;
use tracing::debug;

use crate::binding::{Binding, EngineInfo, HelperContext};
use crate::config::{ConfigSource, PathSource, ViewOptions};
use crate::engine::{MiniJinjaEngine, TemplateEngine};
use crate::error::ViewError;
use crate::template::{read_globals, SharedGlobals, Template};

/// Engine adapter facade: options, engine and globals for the whole process.
///
/// # Example
///
/// ```rust
/// use pagesmith::{Binding, MapConfig, View};
/// use std::path::PathBuf;
///
/// let config = MapConfig::new().with("templating.doctype", "html");
/// let view = View::new(&PathBuf::from("/nonexistent"), &config);
/// view.register_global("site", Binding::value("Example"));
///
/// let out = view.render_string("{{ site }} ({{ doctype }})").unwrap();
/// assert_eq!(out, "Example (html)");
/// ```
pub struct View {
    engine: Arc<dyn TemplateEngine>,
    options: Arc<ViewOptions>,
    globals: SharedGlobals,
}

impl View {
    /// Builds a view over the bundled MiniJinja engine.
    ///
    /// Options are read from `config` under `templating.*` and the template root
    /// from `paths`. Missing options take their defaults; this never fails.
    pub fn new<P, C>(paths: &P, config: &C) -> Self
    where
        P: PathSource + ?Sized,
        C: ConfigSource + ?Sized,
    {
        Self::with_engine(paths, config, MiniJinjaEngine::new())
    }

    /// Builds a view over a custom engine.
    pub fn with_engine<P, C, E>(paths: &P, config: &C, engine: E) -> Self
    where
        P: PathSource + ?Sized,
        C: ConfigSource + ?Sized,
        E: TemplateEngine + 'static,
    {
        Self::from_options_with_engine(ViewOptions::from_sources(paths, config), engine)
    }

    /// Builds a view from an already resolved options snapshot.
    pub fn from_options(options: ViewOptions) -> Self {
        Self::from_options_with_engine(options, MiniJinjaEngine::new())
    }

    /// Builds a view from an options snapshot and a custom engine.
    pub fn from_options_with_engine<E>(options: ViewOptions, mut engine: E) -> Self
    where
        E: TemplateEngine + 'static,
    {
        engine.configure(&options);
        debug!(
            engine = %engine.info(),
            root = %options.base_path.display(),
            pretty = options.pretty,
            cache = options.cache,
            doctype = ?options.doctype,
            self_referencing = options.self_referencing,
            debug = options.debug,
            "created view"
        );
        Self {
            engine: Arc::new(engine),
            options: Arc::new(options),
            globals: SharedGlobals::default(),
        }
    }

    /// Identity of the engine behind this view.
    pub fn engine_info(&self) -> EngineInfo {
        self.engine.info()
    }

    /// The options captured at construction.
    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Creates a fresh template sharing this view's engine, options and globals.
    pub fn template(&self) -> Template {
        Template::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.options),
            Arc::clone(&self.globals),
        )
    }

    /// Creates a fresh template with `locals` already shared.
    pub fn share<I, K, V>(&self, locals: I) -> Template
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Binding>,
    {
        let mut template = self.template();
        template.share(locals);
        template
    }

    /// Renders a file template through a fresh template.
    pub fn render(&self, reference: &str) -> Result<String, ViewError> {
        self.template().render(reference)
    }

    /// Renders a file template with locals through a fresh template.
    pub fn render_with<T>(&self, reference: &str, locals: &T) -> Result<String, ViewError>
    where
        T: Serialize + ?Sized,
    {
        self.template().render_with(reference, locals)
    }

    /// Renders template source through a fresh template.
    pub fn render_string(&self, source: &str) -> Result<String, ViewError> {
        self.template().render_string(source)
    }

    /// Renders template source with locals through a fresh template.
    pub fn render_string_with<T>(&self, source: &str, locals: &T) -> Result<String, ViewError>
    where
        T: Serialize + ?Sized,
    {
        self.template().render_string_with(source, locals)
    }

    /// Inserts or replaces a global.
    ///
    /// Visible immediately to every template of this view, including templates
    /// created before the call. Meant for start-up wiring.
    pub fn register_global(&self, key: impl Into<String>, value: impl Into<Binding>) {
        let key = key.into();
        let value = value.into();
        debug!(key = %key, helper = value.is_helper(), "registered global");
        self.globals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    /// Registers a helper function as a global.
    pub fn register_helper<F>(&self, key: impl Into<String>, f: F)
    where
        F: Fn(&HelperContext, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.register_global(key, Binding::helper(f));
    }

    /// Whether a global is registered under `key`.
    pub fn has_global(&self, key: &str) -> bool {
        read_globals(&self.globals).contains_key(key)
    }

    /// Names of all registered globals, sorted.
    pub fn global_names(&self) -> Vec<String> {
        read_globals(&self.globals).keys().cloned().collect()
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("engine", &self.engine.info())
            .field("options", &self.options)
            .field("globals", &self.global_names())
            .finish()
    }
}

/// Something that renders views and hands out per-request templates.
pub trait ViewProvider {
    /// Creates a fresh, isolated template.
    fn fresh(&self) -> Template;

    /// Renders a file template through a fresh template.
    fn render(&self, reference: &str) -> Result<String, ViewError> {
        self.fresh().render(reference)
    }

    /// Renders template source through a fresh template.
    fn render_string(&self, source: &str) -> Result<String, ViewError> {
        self.fresh().render_string(source)
    }
}

impl ViewProvider for View {
    fn fresh(&self) -> Template {
        self.template()
    }
}

/// Per-request holder for a lazily created template.
///
/// The first access creates a template from the provider; later accesses in
/// the same request see the same template and its locals. Build one holder per
/// request.
///
/// ```rust
/// use pagesmith::{MapConfig, RequestView, View};
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// let view = Arc::new(View::new(&PathBuf::from("/nonexistent"), &MapConfig::new()));
///
/// let mut request = RequestView::new(Arc::clone(&view));
/// request.template().share([("user", "Ada")]);
/// assert_eq!(request.template().render_string("{{ user }}").unwrap(), "Ada");
///
/// let mut next = RequestView::new(view);
/// assert_eq!(next.template().render_string("{{ user }}").unwrap(), "");
/// ```
pub struct RequestView<V: ViewProvider = View> {
    provider: Arc<V>,
    template: Option<Template>,
}

impl<V: ViewProvider> RequestView<V> {
    /// Creates a holder; no template is created until first access.
    pub fn new(provider: Arc<V>) -> Self {
        Self {
            provider,
            template: None,
        }
    }

    /// The request's template, created on first access.
    pub fn template(&mut self) -> &mut Template {
        let provider = &self.provider;
        self.template.get_or_insert_with(|| provider.fresh())
    }

    /// Whether the template has been created yet.
    pub fn is_initialized(&self) -> bool {
        self.template.is_some()
    }

    /// Consumes the holder, returning the template if one was created.
    pub fn into_template(self) -> Option<Template> {
        self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use serde_json::json;
    use std::path::PathBuf;

    fn view() -> View {
        View::new(&PathBuf::from("/nonexistent"), &MapConfig::new())
    }

    #[test]
    fn view_has_minijinja_engine() {
        assert_eq!(view().engine_info().name(), "MiniJinja");
    }

    #[test]
    fn register_global_adds_value() {
        let view = view();
        assert!(!view.has_global("myValue"));

        view.register_global("myValue", "a-string");
        assert!(view.has_global("myValue"));
        assert_eq!(view.global_names(), vec!["myValue".to_string()]);
        assert_eq!(view.template().resolve("myValue").as_str(), Some("a-string"));
    }

    #[test]
    fn register_global_overwrites() {
        let view = view();
        view.register_global("k", "one");
        view.register_global("k", "two");
        assert_eq!(view.render_string("{{ k }}").unwrap(), "two");
    }

    #[test]
    fn template_shares_engine_and_options() {
        let view = view();
        let template = view.template();
        assert_eq!(template.engine_info(), view.engine_info());
        assert_eq!(template.base_path(), view.options().base_path.as_path());
        assert!(template.locals().is_empty());
    }

    #[test]
    fn share_returns_template_with_locals() {
        let template = view().share([("myKey", "some-string")]);
        assert_eq!(template.resolve("myKey").as_str(), Some("some-string"));
    }

    #[test]
    fn renders_are_independent() {
        let view = view();
        let first = view
            .render_string_with("{{ secret }}", &json!({"secret": "s3cr3t"}))
            .unwrap();
        let second = view.render_string("{{ secret }}").unwrap();
        assert_eq!(first, "s3cr3t");
        assert_eq!(second, "");
    }

    #[test]
    fn registered_helper_sees_engine() {
        let view = view();
        view.register_helper("engineName", |ctx, _| Ok(Value::from(ctx.engine.name())));
        assert_eq!(view.render_string("{{ engineName() }}").unwrap(), "MiniJinja");
    }

    #[test]
    fn environment_functions_survive_view_construction() {
        let mut engine = MiniJinjaEngine::new();
        engine
            .environment_mut()
            .add_function("shout", |s: String| s.to_uppercase());

        let view = View::from_options_with_engine(ViewOptions::new("/nonexistent"), engine);
        assert_eq!(view.render_string(r#"{{ shout("hi") }}"#).unwrap(), "HI");
    }

    #[test]
    fn late_global_visible_to_existing_template() {
        let view = view();
        let template = view.template();
        assert_eq!(template.resolve("late").as_str(), Some(""));

        view.register_global("late", "registered-after");
        assert_eq!(template.resolve("late").as_str(), Some("registered-after"));
    }

    #[test]
    fn request_view_is_lazy_and_reused() {
        let view = Arc::new(view());
        let mut request = RequestView::new(Arc::clone(&view));
        assert!(!request.is_initialized());

        request.template().share([("user", "Ada")]);
        assert!(request.is_initialized());
        assert_eq!(request.template().resolve("user").as_str(), Some("Ada"));

        let mut other = RequestView::new(view);
        assert_eq!(other.template().resolve("user").as_str(), Some(""));
        assert!(other.into_template().is_some());

        assert!(request.into_template().is_some_and(|t| t.local("user").is_some()));
    }

    #[test]
    fn provider_trait_renders() {
        fn render_via<P: ViewProvider>(provider: &P) -> String {
            provider.render_string("{{ 1 + 1 }}").unwrap()
        }
        assert_eq!(render_via(&view()), "2");
    }
}
