#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use xmlidx::index::wildcard::WildcardPattern;

#[derive(Arbitrary, Debug)]
struct Input {
    pattern: Vec<u8>,
    token: Vec<u8>,
}

fuzz_target!(|input: Input| {
    if input.pattern.len() > 64 || input.token.len() > 64 {
        return;
    }
    let pattern = WildcardPattern::parse(&input.pattern);
    let matched = pattern.matches(&input.token);

    // The automaton and the generated regex must agree
    if let Ok(regex) = regex::bytes::Regex::new(&pattern.to_regex()) {
        assert_eq!(matched, regex.is_match(&input.token));
    }
    if matched {
        assert!(input.token.len() >= pattern.min_len());
        if let Some(max) = pattern.max_len() {
            assert!(input.token.len() <= max);
        }
    }
});
