/*
 * proptest_identity.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Property-based tests for the transducer's pass-through behavior.
 *
 * Documents are generated already in the writer's canonical form
 * (`<n a="v">`, `<n />`, no line breaks), so a run with no tasks must
 * reproduce them byte for byte, and a rename task must only touch the
 * renamed tag.
 */

use proptest::prelude::*;
use quarto_xml_tasks::{Directive, TaskRunner};

const NAMES: &[&str] = &["a", "b", "c", "item"];

fn name() -> impl Strategy<Value = String> {
    prop::sample::select(NAMES).prop_map(|n| n.to_string())
}

fn attribute() -> impl Strategy<Value = String> {
    prop::option::of(("[a-z]{1,3}", "[a-z0-9]{0,4}"))
        .prop_map(|attr| attr.map(|(k, v)| format!(" {}=\"{}\"", k, v)).unwrap_or_default())
}

fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z ]{0,8}",
        (name(), attribute()).prop_map(|(n, a)| format!("<{}{} />", n, a)),
    ]
}

fn element() -> impl Strategy<Value = String> {
    leaf().prop_recursive(4, 32, 4, |inner| {
        (name(), attribute(), prop::collection::vec(inner, 0..4))
            .prop_map(|(n, a, children)| format!("<{}{}>{}</{}>", n, a, children.concat(), n))
    })
}

fn document() -> impl Strategy<Value = String> {
    (name(), prop::collection::vec(element(), 0..4))
        .prop_map(|(n, children)| format!("<{}>{}</{}>", n, children.concat(), n))
}

fn run(mut runner: TaskRunner<'_>, input: &str) -> String {
    let input = input.to_string();
    runner.set_input(std::io::Cursor::new(input));
    runner.execute(String::new()).expect("run failed")
}

proptest! {
    #[test]
    fn identity_without_tasks(doc in document()) {
        prop_assert_eq!(run(TaskRunner::new(), &doc), doc);
    }

    #[test]
    fn rename_touches_only_the_renamed_tag(doc in document()) {
        let mut runner = TaskRunner::new();
        runner.add_task("b", |_, _, _| Ok(Directive::new().rename("z")));

        let expected = doc
            .replace("<b>", "<z>")
            .replace("<b ", "<z ")
            .replace("</b>", "</z>");
        prop_assert_eq!(run(runner, &doc), expected);
    }

    #[test]
    fn collecting_does_not_change_output(doc in document()) {
        let mut runner = TaskRunner::new();
        runner.add_task("item", |_, _, _| Ok(Directive::new().collect(true)));
        prop_assert_eq!(run(runner, &doc), doc);
    }
}
