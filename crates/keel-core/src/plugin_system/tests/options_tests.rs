#![cfg(test)]

use std::collections::BTreeMap;

use serde_json::json;

use crate::plugin_system::options::format_option;
use crate::plugin_system::tests::support::{Fixture, fixture, metadata, plain, with_key};

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Core, A requiring Core (disabled by default), B requiring Core
fn setup() -> Fixture {
    fixture(vec![
        plain(metadata("Core", "1.0", &[])),
        plain(with_key(
            metadata("A", "1.0", &[("Core", "1.0")]),
            "DisabledByDefault",
            json!(true),
        )),
        plain(metadata("B", "1.0", &[("Core", "1.0")])),
    ])
}

fn parse(f: &mut Fixture, items: &[&str]) -> crate::Result<BTreeMap<String, String>> {
    f.manager.parse_options(&args(items), &BTreeMap::new())
}

fn enabled(f: &Fixture, name: &str) -> bool {
    f.manager.plugin_by_name(name).expect(name).is_effectively_enabled()
}

#[test]
fn test_load_enables_plugin() {
    let mut f = setup();
    assert!(!enabled(&f, "A"));

    parse(&mut f, &["-load", "A"]).expect("parsed");

    assert!(enabled(&f, "A"));
    assert_eq!(f.manager.arguments_for_restart(), &["-load", "A"]);
    assert!(f.manager.arguments().is_empty());
}

#[test]
fn test_noload_all_then_load_one() {
    let mut f = setup();

    parse(&mut f, &["-noload", "all", "-load", "B"]).expect("parsed");

    assert!(enabled(&f, "B"));
    assert!(enabled(&f, "Core"), "required by B");
    assert!(f.manager.plugin_by_name("Core").expect("Core").is_enabled_indirectly());
    assert!(!enabled(&f, "A"));
    assert_eq!(f.manager.arguments_for_restart(), &["-noload", "all", "-load", "B"]);
}

#[test]
fn test_noload_disables_dependents() {
    let mut f = setup();

    parse(&mut f, &["-noload", "Core"]).expect("parsed");

    for name in ["Core", "A", "B"] {
        assert!(f.manager.plugin_by_name(name).expect(name).is_force_disabled(), "{}", name);
        assert!(!enabled(&f, name), "{}", name);
    }
}

#[test]
fn test_load_all_enables_everything() {
    let mut f = setup();
    parse(&mut f, &["-load", "all"]).expect("parsed");
    assert!(f.manager.plugins().iter().all(|s| s.is_force_enabled()));
}

#[test]
fn test_option_errors() {
    let cases: &[(&[&str], &str)] = &[
        (&["-load"], "The option -load requires an argument."),
        (&["-noload", "Nope"], "The plugin \"Nope\" does not exist."),
        (&["-bogus"], "Unknown option -bogus"),
        (&["-test", "A", "-test", "A"], "The plugin \"A\" is specified twice for testing."),
        (&["-notest", "A"], "The plugin \"A\" is not tested."),
    ];
    for (input, message) in cases {
        let mut f = setup();
        let error = parse(&mut f, input).expect_err("must fail");
        assert_eq!(error.to_string(), *message, "{:?}", input);
    }
}

#[test]
fn test_unknown_option_stops_parsing() {
    let mut f = setup();
    let error = parse(&mut f, &["first", "-bogus", "second"]).expect_err("must fail");
    assert_eq!(error.to_string(), "Unknown option -bogus");
    assert_eq!(f.manager.arguments(), &["first"]);
}

#[test]
fn test_app_options_are_returned() {
    let mut f = setup();
    let app_options = BTreeMap::from([
        ("-help".to_string(), false),
        ("-pid".to_string(), true),
        ("-client".to_string(), false),
    ]);

    let found = f
        .manager
        .parse_options(&args(&["-pid", "42", "file.txt", "-help"]), &app_options)
        .expect("parsed");

    assert_eq!(found.len(), 2);
    assert_eq!(found["-pid"], "42");
    assert_eq!(found["-help"], "");
    assert_eq!(f.manager.arguments(), &["file.txt"]);
}

#[test]
fn test_app_option_missing_argument() {
    let mut f = setup();
    let app_options = BTreeMap::from([("-pid".to_string(), true)]);
    let error = f
        .manager
        .parse_options(&args(&["-pid"]), &app_options)
        .expect_err("must fail");
    assert_eq!(error.to_string(), "The option -pid requires an argument.");
}

#[test]
fn test_end_of_options_marker() {
    let mut f = setup();

    parse(&mut f, &["a", "--", "-load", "A", "-bogus"]).expect("parsed");

    assert_eq!(f.manager.arguments(), &["a", "-load", "A", "-bogus"]);
    assert!(!enabled(&f, "A"));
}

#[test]
fn test_plugin_options_are_routed_to_their_plugin() {
    let mut f = fixture(vec![plain(with_key(
        metadata("Editor", "1.0", &[]),
        "Arguments",
        json!([
            { "Name": "-theme", "Parameter": "name", "Description": "Color theme" },
            { "Name": "-readonly", "Description": "Open files read-only" }
        ]),
    ))]);

    parse(&mut f, &["-readonly", "-theme", "dark", "notes.txt"]).expect("parsed");

    let editor = f.manager.plugin_by_name("Editor").expect("Editor");
    assert_eq!(editor.arguments(), &["-readonly", "-theme", "dark"]);
    assert_eq!(f.manager.arguments(), &["notes.txt"]);
    assert_eq!(f.manager.plugin_for_option("-theme").map(|(_, p)| p), Some(true));
    assert_eq!(f.manager.plugin_for_option("-readonly").map(|(_, p)| p), Some(false));
    assert!(f.manager.plugin_for_option("-other").is_none());
}

#[test]
fn test_test_option_restricts_loaded_plugins() {
    let mut f = setup();

    parse(&mut f, &["-test", "B,first,second:row1"]).expect("parsed");

    assert!(f.manager.test_run_requested());
    let tests = f.manager.test_specs();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].spec, f.id("B"));
    assert_eq!(tests[0].test_functions, vec!["first", "second:row1"]);
    assert!(enabled(&f, "B"));
    assert!(enabled(&f, "Core"));
    assert!(!enabled(&f, "A"));
}

#[test]
fn test_test_all_uses_load_order() {
    let mut f = setup();

    parse(&mut f, &["-test", "all"]).expect("parsed");

    let names: Vec<&str> = f
        .manager
        .test_specs()
        .iter()
        .map(|t| f.manager.spec(t.spec).name())
        .collect();
    assert_eq!(names, vec!["Core", "A", "B"]);
    assert!(enabled(&f, "A"));
}

#[test]
fn test_notest_removes_plugin_from_run() {
    let mut f = setup();

    parse(&mut f, &["-test", "all", "-notest", "A"]).expect("parsed");

    assert_eq!(f.manager.test_specs().len(), 2);
    assert!(f.manager.test_specs().iter().all(|t| t.spec != f.id("A")));
    assert!(!enabled(&f, "A"));
}

#[test]
fn test_profile_and_crashcheck_flags() {
    let mut f = setup();
    f.manager.set_crash_check_enabled(true);

    parse(&mut f, &["-profile", "-no-crashcheck"]).expect("parsed");

    assert!(f.manager.is_profiling());
    assert!(!f.manager.is_crash_check_enabled());
}

#[test]
fn test_format_option_alignment() {
    let mut out = String::new();
    format_option(&mut out, "-load", "plugin", "Load it", 4, 34);
    let expected = format!("    -load <plugin>{}Load it\n", " ".repeat(16));
    assert_eq!(out, expected);
    assert_eq!(out.find("Load it"), Some(34));

    let mut out = String::new();
    let long = "-an-option-name-wider-than-the-column";
    format_option(&mut out, long, "", "Described below", 4, 34);
    assert_eq!(out, format!("    {}\n{}Described below\n", long, " ".repeat(34)));
}

#[test]
fn test_help_lists_manager_and_plugin_options() {
    let f = fixture(vec![
        plain(with_key(
            metadata("Editor", "1.0", &[]),
            "Arguments",
            json!([{ "Name": "-theme", "Parameter": "name", "Description": "Color theme" }]),
        )),
        plain(metadata("Plain", "2.1", &[])),
    ]);

    let mut out = String::new();
    f.manager.format_options(&mut out, 4, 34);
    assert!(out.contains("Load <plugin> and all plugins that it requires"));
    assert!(out.contains("    -no-crashcheck"));
    assert!(out.contains("Exclude all of the plugin's tests from the test run"));

    let mut out = String::new();
    f.manager.format_plugin_options(&mut out, 4, 34);
    assert!(out.starts_with("\nPlugin: Editor\n    -theme <name>"));
    assert!(out.ends_with("Color theme\n"));
    assert!(!out.contains("Plain"));

    let mut out = String::new();
    f.manager.format_plugin_versions(&mut out);
    assert_eq!(out, "  Editor 1.0 The Editor plugin\n  Plain 2.1 The Plain plugin\n");
}
