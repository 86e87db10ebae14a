// Copyright 2016 PingCAP, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

//! Normalization of user-supplied identifiers into the Prometheus character
//! set. Scrubbed forms are what the registry compares for identity, so two
//! inputs that scrub to the same string collide.

/// Scrub a metric or label name into `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Every character outside `[A-Za-z0-9_]` maps to `_`, and a leading digit
/// maps to `_` as well. The empty string scrubs to the empty string; callers
/// reject empty names.
pub fn scrub_name(s: &str) -> String {
    scrub(s, true)
}

/// Scrub a label value into `[A-Za-z0-9_]*`. Unlike names, values have no
/// first-character rule.
pub fn scrub_label_value(s: &str) -> String {
    scrub(s, false)
}

fn scrub(s: &str, leading_digit_invalid: bool) -> String {
    s.chars()
        .enumerate()
        .map(|(i, c)| match c {
            'A'..='Z' | 'a'..='z' | '_' => c,
            '0'..='9' if i > 0 || !leading_digit_invalid => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_name() {
        let tbl = vec![
            ("foo", "foo"),
            ("foo&bar", "foo_bar"),
            ("foo_bar", "foo_bar"),
            ("9foo", "_foo"),
            ("foo9", "foo9"),
            ("foo.bar-baz", "foo_bar_baz"),
            ("", ""),
            ("_", "_"),
            ("über", "_ber"),
        ];
        for (input, want) in tbl {
            assert_eq!(scrub_name(input), want);
        }
    }

    #[test]
    fn test_scrub_label_value() {
        assert_eq!(scrub_label_value("9lives"), "9lives");
        assert_eq!(scrub_label_value("a value"), "a_value");
        assert_eq!(scrub_label_value("quuxval"), "quuxval");
    }

    #[test]
    fn test_scrub_idempotent() {
        let inputs = vec!["foo&bar", "9foo", "a b c", "", "all_valid_42", "日本語"];
        for s in inputs {
            let once = scrub_name(s);
            assert_eq!(scrub_name(&once), once);
            let once = scrub_label_value(s);
            assert_eq!(scrub_label_value(&once), once);
        }
    }

    #[test]
    fn test_scrub_output_grammar() {
        for s in &["foo&bar", "9foo", "-", "x:y", "a\u{1F600}b"] {
            let out = scrub_name(s);
            let mut chars = out.chars();
            if let Some(first) = chars.next() {
                assert!(first.is_ascii_alphabetic() || first == '_');
            }
            for c in chars {
                assert!(c.is_ascii_alphanumeric() || c == '_');
            }
        }
    }
}
