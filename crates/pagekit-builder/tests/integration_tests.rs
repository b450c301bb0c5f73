/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for pagekit-builder: markup in, HTML out.
 */

use pagekit_builder::{
    ContextStack, EngineConfig, EngineState, ErrorCause, ErrorKind, OutputNode, TrimMode,
    evaluate_formula, parse_fragment, to_html,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;

/// Helper to get the path to test fixtures
fn fixture_path(name: &str) -> std::path::PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", name))
}

fn expand(markup: &str, data: serde_json::Value) -> String {
    let nodes = parse_fragment(markup).unwrap();
    let mut state = EngineState::new(ContextStack::from_json(data));
    to_html(&state.expand_document(&nodes).unwrap())
}

fn letters(word: &str) -> String {
    word.chars()
        .map(|c| format!("<span data-c=\"{c}\" class=\"letter-cell letter-underline\"></span>"))
        .collect()
}

#[test]
fn test_puzzle_fixture() {
    let nodes = parse_fragment(&load_fixture("puzzle.xml")).unwrap();
    let data: serde_json::Value = serde_json::from_str(&load_fixture("puzzle.json")).unwrap();
    let config = EngineConfig {
        trim: TrimMode::On,
        ..Default::default()
    };
    let mut state = EngineState::new(ContextStack::from_json(data)).with_config(config);
    let html = to_html(&state.expand_document(&nodes).unwrap());

    let expected = format!(
        "<div class=\"puzzle\"><h1>Warm-up</h1><ol>\
         <li class=\"clue\">1. Feline{}</li>\
         <li class=\"clue\">2. Canine{}</li>\
         </ol><p>No footer</p></div>",
        letters("CAT"),
        letters("DOG")
    );
    assert_eq!(html, expected);
    assert!(state.diagnostics().is_empty());
}

#[test]
fn test_loop_law() {
    assert_eq!(
        expand("<for range=\"i\" from=\"1\" to=\"3\">{i}</for>", json!({})),
        "123"
    );
    assert_eq!(
        expand("<for range=\"i\" from=\"5\" to=\"0\" step=\"-2\">{i},</for>", json!({})),
        "5,3,1,"
    );
}

#[test]
fn test_conditional_law() {
    let markup = "<if test=\"n\" lt=\"0\">neg</if>\
                  <elseif test=\"n\" eq=\"0\">zero</elseif>\
                  <elseif test=\"n\" gt=\"0\">pos</elseif>\
                  <else>nan</else>";
    assert_eq!(expand(markup, json!({"n": -1})), "neg");
    assert_eq!(expand(markup, json!({"n": 0})), "zero");
    assert_eq!(expand(markup, json!({"n": 7})), "pos");

    // Exactly one body runs even when later tests would also pass
    let markup = "<if test=\"a\">1</if><elseif test=\"a\">2</elseif><else>3</else>";
    assert_eq!(expand(markup, json!({"a": true})), "1");
    assert_eq!(expand(markup, json!({"a": false})), "3");
}

#[test]
fn test_template_law() {
    let markup = "<template id=\"t\" b=\"dflt\">[{a}|{a$text}|{a$}|{b}]</template>\
                  <use template=\"t\" a=\"5\"/>\
                  <use template=\"t\" a=\"{five}\" b=\"given\"/>";
    assert_eq!(
        expand(markup, json!({"five": 5})),
        "[5|5|5|dflt][5|5|{five}|given]"
    );

    // Omitted arguments with no default are simply absent
    let markup = "<template id=\"t\"><if notex=\"x\">none</if></template><use template=\"t\"/>";
    assert_eq!(expand(markup, json!({})), "none");
}

#[test]
fn test_error_locality() {
    let nodes = parse_fragment("<ul><li nothrow=\"\">{1 +}</li><li>{ok}</li></ul>").unwrap();
    let mut state = EngineState::new(ContextStack::from_json(json!({"ok": "fine"})));
    let output = state.expand_document(&nodes).unwrap();
    assert_eq!(to_html(&output), "<ul><li></li><li>fine</li></ul>");

    let diagnostics = state.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind(), ErrorKind::Parse);
}

#[test]
fn test_error_report() {
    let nodes = parse_fragment("<p><span title=\"{pt.z}\"/></p>").unwrap();
    let mut state = EngineState::new(ContextStack::from_json(json!({"pt": {"x": 1}})));
    let err = state.expand_document(&nodes).unwrap_err();

    assert_eq!(err.cause(), &ErrorCause::KeyNotFound("z".to_string()));
    assert_eq!(
        err.operations(),
        &["evaluate:binary", "complex_attribute", "clone_attributes"]
    );
    let rendered = err.render();
    assert!(rendered.starts_with("EvaluateError: Key not found in context: z\n{pt.z}\n    ^\n"));
    assert!(rendered.ends_with("Source element stack: <span title=\"{pt.z}\" /> <p>"));
    assert!(err.to_report("page.xml", false).contains("Key not found in context: z"));
}

#[test]
fn test_root_and_scope_access_differ() {
    let markup = "<for each=\"x\" in=\"list\">{?x}/{:x};</for>";
    assert_eq!(
        expand(markup, json!({"x": "root", "list": ["a"]})),
        "a/root;"
    );
}

#[test]
fn test_host_tree_builder() {
    struct Counter(usize);

    impl pagekit_builder::TreeBuilder for Counter {
        type Node = usize;

        fn element(&mut self, _tag: &str, _attributes: &[(&str, &str)], children: Vec<usize>) -> usize {
            self.0 += 1;
            1 + children.iter().sum::<usize>()
        }

        fn text(&mut self, _text: &str) -> usize {
            self.0 += 1;
            1
        }
    }

    let nodes = parse_fragment("<for each=\"x\" in=\"xs\"><b>{x}</b></for>").unwrap();
    let mut state = EngineState::new(ContextStack::from_json(json!({"xs": [1, 2, 3]})));
    let output: Vec<OutputNode> = state.expand_document(&nodes).unwrap();
    let mut counter = Counter(0);
    let sizes: Vec<usize> = output.iter().map(|n| n.build(&mut counter)).collect();
    assert_eq!(sizes, vec![2, 2, 2]);
    assert_eq!(counter.0, 6);
}

#[test]
fn test_formula_evaluation_is_pure() {
    let ctx = ContextStack::from_json(json!({"a": {"b": [10, 20, 30]}}));
    let first = evaluate_formula("a.b.1 * 2 ~ '!'", &ctx).unwrap();
    let second = evaluate_formula("a.b.1 * 2 ~ '!'", &ctx).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.display_text(), "40!");
}
