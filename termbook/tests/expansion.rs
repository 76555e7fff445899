use std::collections::HashMap;

use termbook::include::ExpandError;
use termbook::parser::Parser;
use termbook::variables::VariableTable;
use termbook::{EnvLookup, expand_variables};

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn expand(command: &str, custom: &[(&str, &str)], environment: &[(&str, &str)]) -> String {
    let custom: VariableTable = custom.iter().copied().collect();
    expand_variables(command, &custom, &env(environment))
}

#[test]
fn include_end_to_end() {
    let tb = Parser::new("### A\necho hi\n\n### B\n#include A\necho bye", 0).parse();
    assert_eq!(tb.expand_block("B").unwrap(), "echo hi\necho bye");
}

#[test]
fn block_without_includes_round_trips() {
    let tb = Parser::new("### A\r\necho one\r\necho two\r\n", 0).parse();
    assert_eq!(tb.expand_block("A").unwrap(), "echo one\necho two");
}

#[test]
fn nested_includes_expand_recursively() {
    let tb = Parser::new(
        "### base\ncd /srv\n### build\n#include base\nmake\n### deploy\n#include build\nmake install",
        0,
    )
    .parse();
    assert_eq!(
        tb.expand_block("deploy").unwrap(),
        "cd /srv\nmake\nmake install"
    );
}

#[test]
fn include_target_is_trimmed() {
    let tb = Parser::new("### A\necho a\n### B\n#include   A   \n", 0).parse();
    assert_eq!(tb.expand_block("B").unwrap(), "echo a");
}

#[test]
fn indented_include_is_plain_text() {
    let tb = Parser::new("### A\necho a\n### B\necho b\n  #include A", 0).parse();
    assert_eq!(tb.expand_block("B").unwrap(), "echo b\n  #include A");
}

#[test]
fn empty_block_includes_as_empty_line() {
    let tb = Parser::new("### empty\n### B\n#include empty\necho b", 0).parse();
    assert_eq!(tb.expand_block("B").unwrap(), "\necho b");
}

#[test]
fn missing_include_target_fails() {
    let tb = Parser::new("### B\n#include nowhere\n", 0).parse();
    assert_eq!(
        tb.expand_block("B"),
        Err(ExpandError::MissingBlock("nowhere".into()))
    );
    assert_eq!(
        tb.expand_block("ghost"),
        Err(ExpandError::MissingBlock("ghost".into()))
    );
}

#[test]
fn mutual_includes_are_cyclic() {
    let tb = Parser::new("### A\n#include B\n### B\n#include A\n", 0).parse();
    assert_eq!(
        tb.expand_block("A"),
        Err(ExpandError::CyclicInclude("A".into()))
    );
    assert_eq!(
        tb.expand_block("B"),
        Err(ExpandError::CyclicInclude("B".into()))
    );
}

#[test]
fn self_include_is_cyclic() {
    let tb = Parser::new("### A\necho a\n#include A\n", 0).parse();
    assert!(matches!(
        tb.expand_block("A"),
        Err(ExpandError::CyclicInclude(_))
    ));
}

#[test]
fn sibling_includes_of_one_block_are_not_cycles() {
    let source = "### C\necho c\n### D\n#include C\necho d\n### E\n#include C\necho e\n### F\n#include D\n#include E\n";
    let tb = Parser::new(source, 0).parse();
    assert_eq!(tb.expand_block("D").unwrap(), "echo c\necho d");
    assert_eq!(tb.expand_block("E").unwrap(), "echo c\necho e");
    assert_eq!(
        tb.expand_block("F").unwrap(),
        "echo c\necho d\necho c\necho e"
    );
}

#[test]
fn path_set_is_restored_after_failure() {
    use std::collections::HashSet;
    use termbook::include::expand_includes;

    let tb = Parser::new("### A\n#include missing\n### B\n#include A\n", 0).parse();
    let mut open = HashSet::from(["outer".to_string()]);
    let result = expand_includes("B", tb.block_map(), &mut open);
    assert_eq!(result, Err(ExpandError::MissingBlock("missing".into())));
    assert_eq!(open, HashSet::from(["outer".to_string()]));
}

#[test]
fn custom_variables_win_over_environment() {
    assert_eq!(
        expand(
            "${TEST_VAR}",
            &[("TEST_VAR", "custom-value")],
            &[("TEST_VAR", "env-value")]
        ),
        "custom-value"
    );
    assert_eq!(
        expand(
            "$TEST_VAR",
            &[("TEST_VAR", "custom-value")],
            &[("TEST_VAR", "env-value")]
        ),
        "custom-value"
    );
}

#[test]
fn process_env_syntax_reads_environment_only() {
    assert_eq!(
        expand(
            "{process.env.TEST_VAR}",
            &[("TEST_VAR", "custom-value")],
            &[("TEST_VAR", "env-value")]
        ),
        "env-value"
    );
}

#[test]
fn environment_syntaxes() {
    let vars = [("TEST_VAR", "test-value"), ("ANOTHER_VAR", "another-value")];
    assert_eq!(expand("Value is ${TEST_VAR}", &[], &vars), "Value is test-value");
    assert_eq!(expand("Value is $TEST_VAR", &[], &vars), "Value is test-value");
    assert_eq!(
        expand("Value is {process.env.TEST_VAR}", &[], &vars),
        "Value is test-value"
    );
    assert_eq!(
        expand("${TEST_VAR} and $ANOTHER_VAR", &[], &vars),
        "test-value and another-value"
    );
    assert_eq!(
        expand(
            "${TEST_VAR} and ${CUSTOM_VAR}",
            &[("CUSTOM_VAR", "custom-value")],
            &vars
        ),
        "test-value and custom-value"
    );
}

#[test]
fn unresolved_references_pass_through() {
    assert_eq!(expand("${NONEXISTENT_VAR}", &[], &[]), "${NONEXISTENT_VAR}");
    assert_eq!(expand("$NONEXISTENT_VAR", &[], &[]), "$NONEXISTENT_VAR");
    assert_eq!(
        expand("{process.env.NONEXISTENT_VAR}", &[], &[]),
        "{process.env.NONEXISTENT_VAR}"
    );
}

#[test]
fn empty_environment_values_count_as_unset() {
    assert_eq!(expand("${BLANK}", &[], &[("BLANK", "")]), "${BLANK}");
}

#[test]
fn custom_bare_reference_respects_word_boundaries() {
    assert_eq!(expand("$FOOBAR", &[("FOO", "bar")], &[]), "$FOOBAR");
    assert_eq!(expand("$FOO-baz", &[("FOO", "bar")], &[]), "bar-baz");
    assert_eq!(expand("echo $FOO", &[("FOO", "bar")], &[]), "echo bar");
}

#[test]
fn shell_positionals_are_left_alone() {
    let vars = [("1", "one"), ("$", "dollar")];
    assert_eq!(expand("echo $1 $$ $2", &[], &vars), "echo $1 $$ $2");
}

#[test]
fn custom_variables_apply_in_declaration_order() {
    assert_eq!(
        expand("$A", &[("A", "$B"), ("B", "done")], &[]),
        "done"
    );
    assert_eq!(
        expand("$B", &[("A", "x"), ("B", "$A")], &[]),
        "$A"
    );
}

struct Nothing;

impl EnvLookup for Nothing {
    fn lookup(&self, _name: &str) -> Option<String> {
        None
    }
}

#[test]
fn custom_lookup_implementations_plug_in() {
    let custom: VariableTable = [("HOST", "db.local")].into_iter().collect();
    assert_eq!(
        expand_variables("ssh ${HOST} $USER", &custom, &Nothing),
        "ssh db.local $USER"
    );
}
