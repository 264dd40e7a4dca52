//! # Pagesmith - MiniJinja Views for Web Request Lifecycles
//!
//! `pagesmith` exposes the MiniJinja template engine to a web application's
//! request handling. It does not parse or execute templates itself; it decides
//! which variables a template sees and hands everything to the engine with
//! consistent options.
//!
//! ## Core Concepts
//!
//! - [`View`]: process-wide facade holding the options, the engine and globals
//! - [`Template`]: one render's worth of state; layers locals, options and globals
//! - [`Binding`]: a namespace entry, plain data or a [`Helper`] function
//! - [`ViewOptions`]: immutable option snapshot read from a [`ConfigSource`]
//! - [`globals::register_globals`]: installs `assetsUrl`, `route`, `style`, `script`
//!
//! ## Variable Resolution
//!
//! Inside a template, a name is looked up in this order:
//!
//! 1. locals shared on the template
//! 2. view options (`basedir`, `pretty`, `cache`, `doctype`, `filters`, `self`, `debug`)
//! 3. globals registered on the view
//!
//! Names found nowhere render as the empty string.
//!
//! Helper functions never rely on an implicit receiver. Each call gets a
//! [`HelperContext`] as an explicit first argument, exposing the identity of
//! the engine doing the render.
//!
//! ## Quick Start
//!
//! ```rust
//! use pagesmith::globals::register_globals;
//! use pagesmith::{MapConfig, View};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let config = MapConfig::from_yaml("templating:\n  doctype: html\n").unwrap();
//! let view = View::new(&PathBuf::from("/srv/app/resources/views"), &config);
//! register_globals(
//!     &view,
//!     Arc::new(|name: &str, _params: &minijinja::Value| format!("/{}", name)),
//!     &config,
//! );
//!
//! let mut template = view.template();
//! template.share([("title", "Welcome")]);
//! let html = template
//!     .render_string(r#"<h1>{{ title }}</h1>{{ style("app") }}"#)
//!     .unwrap();
//! assert_eq!(html, r#"<h1>Welcome</h1><link rel="stylesheet" href="/app.css" />"#);
//! ```
//!
//! ## File Templates
//!
//! File templates are addressed by dotted references relative to the views
//! directory: `view.render("emails.welcome")` renders `emails/welcome.jinja`
//! (see [`engine::TEMPLATE_EXTENSIONS`] for the extensions tried).
//!
//! ## Errors
//!
//! Missing configuration falls back to defaults and missing variables render
//! blank. Everything else the engine reports (syntax errors, unknown templates,
//! failing filters) comes back unchanged inside [`ViewError`].

pub mod binding;
pub mod config;
pub mod engine;
mod error;
pub mod globals;
pub mod template;
pub mod view;

pub use binding::{Binding, Bindings, EngineInfo, Filter, Filters, Helper, HelperContext};
pub use config::{
    is_truthy, AppPaths, ConfigSource, MapConfig, PathSource, ViewOptions, CONFIG_PREFIX,
};
pub use engine::{MiniJinjaEngine, Namespace, TemplateEngine, TEMPLATE_EXTENSIONS};
pub use error::ViewError;
pub use globals::{register_globals, UrlBuilder};
pub use template::{SharedGlobals, Template};
pub use view::{RequestView, View, ViewProvider};

// Re-export MiniJinja so callers build values with the same version.
pub use minijinja;
