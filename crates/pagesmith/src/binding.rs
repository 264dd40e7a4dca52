//! Namespace entries for template rendering.
//!
//! Locals and globals both store [`Binding`]s. A binding is either plain data,
//! exposed to templates as-is, or a [`Helper`] function. Helpers never see an
//! implicit receiver: when a binding is resolved for a render, the helper is
//! wrapped into a callable template value that passes a [`HelperContext`] as its
//! first argument. The context carries the [`EngineInfo`] of the engine doing the
//! render, so helpers can tell which engine they run under without reaching for
//! global state.
//!
//! # Example
//!
//! ```rust
//! use pagesmith::{Binding, EngineInfo, HelperContext};
//! use minijinja::{context, Environment, Value};
//!
//! let shout = Binding::helper(|ctx: &HelperContext, args: &[Value]| {
//!     let text = args.first().map(|v| v.to_string()).unwrap_or_default();
//!     Ok(Value::from(format!("{} ({})", text.to_uppercase(), ctx.engine.name())))
//! });
//!
//! let ctx = HelperContext::new(EngineInfo::new("MiniJinja"));
//! let env = Environment::new();
//! let out = env
//!     .render_str("{{ shout('hi') }}", context! { shout => shout.bind(&ctx) })
//!     .unwrap();
//! assert_eq!(out, "HI (MiniJinja)");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minijinja::value::Rest;
use minijinja::{Error, Value};

/// Identity of a template engine, as seen by helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineInfo {
    name: &'static str,
}

impl EngineInfo {
    /// Creates an identity with the given engine name.
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// The engine's name (e.g. `"MiniJinja"`).
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The receiver handed to every helper call.
///
/// Its only contract is exposing the engine identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelperContext {
    /// Identity of the engine running the render.
    pub engine: EngineInfo,
}

impl HelperContext {
    /// Creates a helper context for the given engine.
    pub fn new(engine: EngineInfo) -> Self {
        Self { engine }
    }
}

type HelperFn = dyn Fn(&HelperContext, &[Value]) -> Result<Value, Error> + Send + Sync;

/// A function exposed to templates as a local or global.
///
/// `Helper` is cheap to clone since the function is stored behind an `Arc`.
#[derive(Clone)]
pub struct Helper(Arc<HelperFn>);

impl Helper {
    /// Wraps a function taking the helper context and the call arguments.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&HelperContext, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invokes the helper directly.
    pub fn call(&self, ctx: &HelperContext, args: &[Value]) -> Result<Value, Error> {
        (self.0)(ctx, args)
    }

    /// Returns a template-callable value with `ctx` fixed as the receiver.
    pub fn bind(&self, ctx: &HelperContext) -> Value {
        let helper = self.clone();
        let ctx = *ctx;
        Value::from_function(move |args: Rest<Value>| helper.call(&ctx, &args.0))
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Helper(<fn>)")
    }
}

/// A single entry in a locals or globals mapping.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Plain data, exposed unchanged.
    Value(Value),
    /// A function, bound to a [`HelperContext`] on resolution.
    Helper(Helper),
}

impl Binding {
    /// Creates a data binding.
    pub fn value(value: impl Into<Value>) -> Self {
        Binding::Value(value.into())
    }

    /// Creates a helper binding from a function.
    pub fn helper<F>(f: F) -> Self
    where
        F: Fn(&HelperContext, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Binding::Helper(Helper::new(f))
    }

    /// Whether this binding is a helper function.
    pub fn is_helper(&self) -> bool {
        matches!(self, Binding::Helper(_))
    }

    /// Produces the template value for this binding.
    ///
    /// Data is returned as-is; helpers are bound to `ctx`.
    pub fn bind(&self, ctx: &HelperContext) -> Value {
        match self {
            Binding::Value(value) => value.clone(),
            Binding::Helper(helper) => helper.bind(ctx),
        }
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Value(value)
    }
}

impl From<Helper> for Binding {
    fn from(helper: Helper) -> Self {
        Binding::Helper(helper)
    }
}

impl From<&str> for Binding {
    fn from(value: &str) -> Self {
        Binding::Value(Value::from(value))
    }
}

impl From<String> for Binding {
    fn from(value: String) -> Self {
        Binding::Value(Value::from(value))
    }
}

impl From<bool> for Binding {
    fn from(value: bool) -> Self {
        Binding::Value(Value::from(value))
    }
}

impl From<i64> for Binding {
    fn from(value: i64) -> Self {
        Binding::Value(Value::from(value))
    }
}

impl From<i32> for Binding {
    fn from(value: i32) -> Self {
        Binding::Value(Value::from(value))
    }
}

impl From<f64> for Binding {
    fn from(value: f64) -> Self {
        Binding::Value(Value::from(value))
    }
}

impl From<serde_json::Value> for Binding {
    fn from(value: serde_json::Value) -> Self {
        Binding::Value(Value::from_serialize(&value))
    }
}

/// Mapping of names to bindings, used for both locals and globals.
pub type Bindings = BTreeMap<String, Binding>;

type FilterFn = dyn Fn(&Value, &[Value]) -> Result<Value, Error> + Send + Sync;

/// A template filter: receives the piped value and the filter arguments.
#[derive(Clone)]
pub struct Filter(Arc<FilterFn>);

impl Filter {
    /// Wraps a filter function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Applies the filter.
    pub fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, Error> {
        (self.0)(value, args)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(<fn>)")
    }
}

/// Named filters supplied through configuration.
///
/// Entries are never inspected by the adapter; a misbehaving filter only fails
/// once a template uses it.
#[derive(Clone, Default)]
pub struct Filters {
    entries: BTreeMap<String, Filter>,
}

impl Filters {
    /// Creates an empty filter table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter, returning the table for chaining.
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.insert(name, Filter::new(f));
        self
    }

    /// Inserts or replaces a filter.
    pub fn insert(&mut self, name: impl Into<String>, filter: Filter) {
        self.entries.insert(name.into(), filter);
    }

    /// Looks up a filter by name.
    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.entries.get(name)
    }

    /// Returns true if no filters are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of filters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Filter names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Iterates over `(name, filter)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Filter)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Debug for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filters")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
