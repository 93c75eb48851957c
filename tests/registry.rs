use std::path::PathBuf;

use rstest::rstest;
use sieve_syntax::{GrammarError, Parser};

fn extension(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/extensions")
        .join(format!("{name}.json"))
}

fn parser_with(custom: &[&str]) -> Parser {
    let paths: Vec<PathBuf> = custom.iter().map(|name| extension(name)).collect();
    Parser::new(None, &paths).unwrap()
}

fn require(names: &[&str]) -> String {
    let list = names
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!("require [{list}];\n")
}

#[rstest]
#[case(&["spamtest", "requires"])]
#[case(&["requires", "spamtest"])]
#[case(&["relational", "mixed"])]
#[case(&["mixed", "relational"])]
fn test_requirements_met(#[case] names: &[&str]) {
    let mut parser = parser_with(&["requires", "forbidden", "mixed"]);
    if let Err(e) = parser.parse(&require(names)) {
        panic!("{names:?}: {e}");
    }
}

#[rstest]
#[case(&["requires"], "extension `spamtest` is required by `requires`")]
#[case(&["mixed"], "extension `relational` is required by `mixed`")]
#[case(&["mixed", "spamtest"], "extension spamtest cannot be loaded together with mixed")]
#[case(
    &["vacation", "mixed", "spamtest"],
    "extension vacation cannot be loaded together with mixed"
)]
#[case(&["spamtest", "forbidden"], "extension spamtest cannot be loaded together with forbidden")]
#[case(&["forbidden", "spamtest"], "extension spamtest cannot be loaded together with forbidden")]
fn test_requirements_violated(#[case] names: &[&str], #[case] problem: &str) {
    let mut parser = parser_with(&["requires", "forbidden", "mixed"]);
    let err = parser.parse(&require(names)).unwrap_err();
    let message = err.message();
    assert!(
        message.starts_with("extension requirements are not fulfilled:\n"),
        "{message}"
    );
    assert!(message.contains(problem), "{message}");
    assert_eq!(err.line(), 2);
}

#[test]
fn test_forbidden_in_separate_requires() {
    let mut parser = parser_with(&["forbidden"]);
    let err = parser
        .parse("require \"spamtest\";\nrequire \"forbidden\";\n")
        .unwrap_err();
    assert!(err
        .message()
        .ends_with("extension spamtest cannot be loaded together with forbidden"));
}

#[test]
fn test_unsupported_parameter_type() {
    let mut parser = parser_with(&["wrong"]);
    let err = parser.parse("require \"wrong\";").unwrap_err();
    assert_eq!(
        err.message(),
        "Unsupported parameter type 'silly' in extension 'wrong'"
    );
    assert_eq!(err.line(), 1);
}

#[test]
fn test_unsupported_element_type() {
    let mut parser = parser_with(&["wrong-element"]);
    let err = parser.parse("require \"wrong-element\";").unwrap_err();
    assert_eq!(
        err.message(),
        "Unsupported extension type 'silly' in extension 'wrong-element'"
    );
}

#[test]
fn test_unused_broken_extension_is_harmless() {
    let mut parser = parser_with(&["wrong", "wrong-element"]);
    let script = "require \"fileinto\";\nfileinto \"Junk\";";
    parser.parse(script).unwrap();
}

#[test]
fn test_missing_custom_resource() {
    let err = Parser::new(None, &[extension("does-not-exist")]).unwrap_err();
    assert!(matches!(err, GrammarError::Io { .. }));
}

#[rstest]
#[case("greet \"hello\";")]
#[case("greet \"HI\";")]
#[case("greet :formal \"Hello\";")]
#[case("greet :Casual \"hi\";")]
fn test_custom_command(#[case] body: &str) {
    let mut parser = parser_with(&["greeting"]);
    let script = format!("require \"greeting\";\n{body}");
    if let Err(e) = parser.parse(&script) {
        panic!("{body}: {e}");
    }
    assert_eq!(parser.script_text(), script);
}

#[rstest]
#[case("greet \"Howdy\";", "quoted string \"Howdy\" where greeting expected")]
#[case("greet :rude \"hi\";", "unexpected tag :rude")]
#[case("greet;", "semicolon where string expected near ;")]
fn test_custom_command_rejects(#[case] body: &str, #[case] message: &str) {
    let mut parser = parser_with(&["greeting"]);
    let script = format!("require \"greeting\";\n{body}");
    let err = parser.parse(&script).unwrap_err();
    assert_eq!(err.message(), message);
    assert_eq!(err.line(), 2);
}

#[test]
fn test_custom_command_needs_require() {
    let mut parser = parser_with(&["greeting"]);
    let err = parser.parse("greet \"hi\";").unwrap_err();
    assert_eq!(err.message(), "unknown command greet");
}

#[test]
fn test_allow_list_limits_builtin_extensions() {
    let enabled = vec!["fileinto".to_string()];
    let mut parser = Parser::new(Some(&enabled), &[]).unwrap();
    let offered: Vec<_> = parser.registry().require_strings().collect();
    assert_eq!(offered, vec!["fileinto"]);

    parser.parse("require \"fileinto\";").unwrap();
    let err = parser.parse("require \"vacation\";").unwrap_err();
    assert_eq!(
        err.message(),
        "quoted string \"vacation\" where require string expected"
    );
}

#[test]
fn test_allow_list_keeps_custom_extensions() {
    let enabled: Vec<String> = Vec::new();
    let mut parser = Parser::new(Some(&enabled), &[extension("greeting")]).unwrap();
    let script = "require \"greeting\";\ngreet \"hi\";";
    parser.parse(script).unwrap();
}
