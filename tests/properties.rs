//! Scanning is deterministic, and the layout between tokens never changes what they are.

mod common;

use proptest::prelude::*;
use precomp::{Script, Source, TokenKind, Tokenizer};
use common::kinds;

fn word_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z_][a-z0-9_]{0,7}").expect("valid regex"),
        (0u32..100_000).prop_map(|value| value.to_string()),
        (0u32..4096).prop_map(|value| format!("0x{value:X}")),
        (0u32..1000, 0u32..100).prop_map(|(whole, fraction)| format!("{whole}.{fraction}")),
        prop::sample::select(vec!["+", "-", "*", "/", "%", "==", "!=", "<=", ">>=", "&&", "||", "(", ")",
            "{", "}", "[", "]", ",", ";", ":", "?", "->", "::", "..."]).prop_map(str::to_string),
        prop::sample::select(vec!["'c'", "'\\n'", "\"text\"", "\"with space\""]).prop_map(str::to_string),
    ]
}

fn separator_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![" ", "  ", "\t", "\n", " \n\n ", " /* note */ ", " // note\n", "\r\n"])
}

/// Joins `words` so that no two strings touch, keeping the scanner from merging them.
fn layout(words: &[String], separators: &[&str]) -> String {
    let mut text = String::new();
    for (index, word) in words.iter().enumerate() {
        if index > 0 {
            let previous_is_string = words[index - 1].starts_with('"');
            if previous_is_string && word.starts_with('"') {
                text.push_str(" ; ");
            } else {
                text.push_str(separators[index % separators.len()]);
            }
        }
        text.push_str(word);
    }
    text
}

fn precompile(text: &str) -> Vec<(TokenKind, String)> {
    let tokens = Source::from_memory("prop.txt", text).tokenize_until_end().expect("scannable input");
    kinds(&tokens)
}

proptest! {
    #[test]
    fn rescanning_gives_identical_tokens(
        words in prop::collection::vec(word_strategy(), 1..40),
        separators in prop::collection::vec(separator_strategy(), 1..8),
    ) {
        let text = layout(&words, &separators);
        let first = Script::new("prop.txt", &text).tokenize_until_end().expect("scannable input");
        let second = Script::new("prop.txt", &text).tokenize_until_end().expect("scannable input");
        let lines = |tokens: &[precomp::Token]| tokens.iter().map(|t| (t.kind, t.text.clone(), t.line)).collect::<Vec<_>>();
        prop_assert_eq!(lines(&first), lines(&second));
    }

    #[test]
    fn layout_does_not_change_tokens(
        words in prop::collection::vec(word_strategy(), 1..40),
        separators in prop::collection::vec(separator_strategy(), 1..8),
    ) {
        let plain = precompile(&layout(&words, &[" "]));
        let spread = precompile(&layout(&words, &separators));
        prop_assert_eq!(plain, spread);
    }
}
