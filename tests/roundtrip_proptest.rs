use proptest::prelude::*;
use sieve_syntax::Parser;

/// A valid script, one token per space-separated word.
const TOKENS: &str = concat!(
    r#"require [ "fileinto" , "relational" ] ; "#,
    r#"if header :contains "Subject" "x" { fileinto "Junk" ; } "#,
    r#"elsif anyof ( size :over 10K , true ) { keep ; } "#,
    r#"else { discard ; stop ; }"#,
);

fn tokens() -> Vec<&'static str> {
    TOKENS.split(' ').collect()
}

fn separator() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        " ",
        "\n",
        "\t",
        "\r\n",
        "# note\n",
        "/* c */",
        "/* multi\nline */",
    ])
    .prop_map(str::to_string)
}

fn gap() -> impl Strategy<Value = String> {
    prop::collection::vec(separator(), 1..3).prop_map(|parts| parts.concat())
}

fn script() -> impl Strategy<Value = String> {
    let tokens = tokens();
    prop::collection::vec(gap(), tokens.len() + 1).prop_map(move |gaps| {
        let mut out = String::new();
        for (gap, token) in gaps.iter().zip(&tokens) {
            out.push_str(gap);
            out.push_str(token);
        }
        out.push_str(&gaps[tokens.len()]);
        out
    })
}

proptest! {
    #[test]
    fn test_separators_survive_round_trip(script in script()) {
        let mut parser = Parser::new(None, &[]).unwrap();
        let parsed = parser.parse(&script);
        prop_assert!(parsed.is_ok(), "{:?}: {:?}", script, parsed);
        prop_assert_eq!(parser.script_text(), script.clone());

        let dump = parser.dump_parse_tree();
        let mut again = Parser::new(None, &[]).unwrap();
        prop_assert!(again.parse(&parser.script_text()).is_ok());
        prop_assert_eq!(again.dump_parse_tree(), dump);
    }
}
