//! Property tests for variable resolution precedence.

use std::path::PathBuf;

use pagesmith::minijinja::Value;
use pagesmith::{Binding, MapConfig, View};
use proptest::prelude::*;

const OPTION_NAMES: &[&str] = &["basedir", "pretty", "cache", "self", "debug", "filters"];

fn view() -> View {
    View::new(&PathBuf::from("/nonexistent"), &MapConfig::new())
}

fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-zA-Z0-9_]{0,8}",
        prop::sample::select(OPTION_NAMES).prop_map(str::to_string),
    ]
}

proptest! {
    #[test]
    fn locals_always_win(name in name_strategy(), local in "[a-z]{1,8}", global in "[A-Z]{1,8}") {
        let view = view();
        view.register_global(name.clone(), global.as_str());
        let mut template = view.template();
        template.share([(name.clone(), local.as_str())]);

        prop_assert_eq!(template.resolve(&name), Value::from(local.as_str()));
    }

    #[test]
    fn options_beat_globals(name in prop::sample::select(OPTION_NAMES), global in "[A-Z]{1,8}") {
        let view = view();
        view.register_global(name, global.as_str());
        let template = view.template();

        prop_assert_eq!(template.resolve(name), view.options().lookup(name).unwrap());
    }

    #[test]
    fn globals_fill_remaining_names(name in "g_[a-z]{1,8}", global in "[A-Z]{1,8}") {
        let view = view();
        view.register_global(name.clone(), Binding::value(global.as_str()));
        prop_assert_eq!(view.template().resolve(&name), Value::from(global.as_str()));
    }

    #[test]
    fn unknown_names_resolve_to_empty_string(name in "u_[a-z]{1,8}") {
        let resolved = view().template().resolve(&name);
        prop_assert_eq!(resolved.as_str(), Some(""));
    }
}
