/*
 * rules.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Rule files applied end to end against fixture documents.
 */

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use quarto_xml_tasks::{Error, Rule, RuleSet, TaskRunner, load_rules};

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test-fixtures")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e))
}

fn apply(rules: &RuleSet, input: &str) -> Result<String, Error> {
    let mut runner = TaskRunner::with_options(rules.options.clone());
    rules.register(runner.registry_mut());
    runner.set_input(input.as_bytes());
    runner.execute(String::new())
}

#[test]
fn test_invoice_fixture() {
    let rules = load_rules(&fixture("invoice.yaml")).unwrap();
    assert_eq!(rules.rules.len(), 5);
    assert!(rules.options.header.print);

    let output = apply(&rules, &fixture("invoice.xml")).unwrap();
    assert_eq!(output, fixture("invoice.expected.xml").trim_end());
}

#[test]
fn test_rules_added_in_code() {
    let rules = RuleSet {
        rules: vec![Rule::delete("draft"), Rule::rename("b", "strong")],
        ..Default::default()
    };
    rules.validate().unwrap();

    let output = apply(&rules, "<p><b>bold</b><draft>wip</draft> end</p>").unwrap();
    assert_eq!(output, "<p><strong>bold</strong> end</p>");
}

#[test]
fn test_delete_children_rule() {
    let rules = load_rules("rules:\n  - tag: body\n    delete-children: true\n").unwrap();
    let output = apply(&rules, "<doc><body x=\"1\"><p>gone</p></body></doc>").unwrap();
    assert_eq!(output, "<doc><body x=\"1\"></body></doc>");
}

#[test]
fn test_text_rule_on_repeated_text_events() {
    let rules = load_rules("rules:\n  - tag: q\n    text: '\"{{_}}\"'\n").unwrap();
    let output = apply(&rules, "<doc><q>one</q><q>two</q></doc>").unwrap();
    assert_eq!(output, "<doc><q>\"one\"</q><q>\"two\"</q></doc>");
}

#[test]
fn test_rename_from_collected_attribute() {
    let rules = load_rules("rules:\n  - tag: field\n    rename: '{{$.kind}}'\n").unwrap();
    let output = apply(&rules, "<form><field kind=\"input\">x</field><field>y</field></form>")
        .unwrap();
    assert_eq!(output, "<form><input kind=\"input\">x</input><field>y</field></form>");
}

#[test]
fn test_fixed_tree_rule() {
    let rules = load_rules(
        "rules:\n  - tag: list\n    collect: true\n    tree: last\n    append:\n      - name: last\n        value: 'last={{last._}}'\n",
    )
    .unwrap();
    let output = apply(&rules, "<list><i>a</i><i>b</i></list>").unwrap();
    assert_eq!(output, "<list><i>a</i><i>b</i><last>last=b</last></list>");
}

#[test]
fn test_flat_tree_rule() {
    let rules = load_rules(
        "rules:\n  - tag: row\n    collect: true\n    tree: false\n    append:\n      - name: seen\n        attributes:\n          cell: '{{cell.$.id}}'\n",
    )
    .unwrap();
    let output = apply(&rules, "<row><group><cell id=\"c1\"/></group></row>").unwrap();
    assert_eq!(
        output,
        "<row><group><cell id=\"c1\" /></group><seen cell=\"c1\"></seen></row>"
    );
}

#[test]
fn test_rule_file_errors() {
    assert!(matches!(
        load_rules("rules:\n  - tag: a\n    delete: maybe\n"),
        Err(Error::Rules { .. })
    ));
    assert!(matches!(
        load_rules("options:\n  indentation-size: 'x'\n"),
        Err(Error::Rules { .. })
    ));
    assert!(matches!(
        load_rules("rules:\n  - tag: ''\n"),
        Err(Error::Rules { .. })
    ));
}

#[test]
fn test_attribute_copied_into_text_is_escaped_once() {
    let rules = load_rules("rules:\n  - tag: p\n    text: '{{$.t}}'\n").unwrap();
    let output = apply(&rules, "<p t=\"a &amp; b\">x</p>").unwrap();
    assert_eq!(output, "<p t=\"a &amp; b\">a &amp; b</p>");
}

#[test]
fn test_text_copied_into_attribute_is_escaped_once() {
    let rules = load_rules(
        "rules:\n  - tag: item\n    collect: true\n    append:\n      - name: copy\n        attributes:\n          v: '{{name[0]._}}'\n",
    )
    .unwrap();
    let output = apply(&rules, "<item><name>A &amp; B</name></item>").unwrap();
    assert_eq!(
        output,
        "<item><name>A &amp; B</name><copy v=\"A &amp; B\"></copy></item>"
    );
}
