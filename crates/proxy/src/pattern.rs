//! Glob-style pattern matching (`*` wildcard only), anchored and
//! case-sensitive, used identically by catalog filtering and by
//! [`discover_tools_by_words`](crate::core_tools::DiscoverToolsByWords).

/// Returns true if `name` matches `pattern`.
///
/// `pattern` is literal characters plus `*`, which matches any (possibly
/// empty) substring; every other character must match exactly. Matching is
/// anchored at both ends. An empty pattern matches only the empty name.
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    matches(name.as_bytes(), pattern.as_bytes())
}

fn matches(name: &[u8], pattern: &[u8]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((b'*', rest)) => matches(name, rest) || (!name.is_empty() && matches(&name[1..], pattern)),
        Some((&c, rest)) => match name.split_first() {
            Some((&n, name_rest)) if n == c => matches(name_rest, rest),
            _ => false,
        },
    }
}

/// Returns true if any pattern in `patterns` matches `name`.
pub fn matches_any<'a>(name: &str, patterns: impl IntoIterator<Item = &'a str>) -> bool {
    patterns.into_iter().any(|pattern| matches_pattern(name, pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_match() {
        assert!(matches_pattern("github__create_issue", "github__create_issue"));
        assert!(!matches_pattern("github__create_issue", "github__create_Issue"));
    }

    #[test]
    fn wildcard_suffix() {
        assert!(matches_pattern("github__create_issue", "github__*"));
        assert!(!matches_pattern("memory__create_issue", "github__*"));
    }

    #[test]
    fn wildcard_prefix_and_middle() {
        assert!(matches_pattern("github__create_issue", "*__create_issue"));
        assert!(matches_pattern("github__create_issue", "github__*_issue"));
    }

    #[test]
    fn empty_pattern_matches_only_empty_name() {
        assert!(matches_pattern("", ""));
        assert!(!matches_pattern("x", ""));
    }

    #[test]
    fn star_matches_empty_substring() {
        assert!(matches_pattern("github__create_issue", "github__create_issue*"));
        assert!(matches_pattern("", "*"));
    }

    #[test]
    fn matches_any_checks_every_pattern() {
        assert!(matches_any("github__create_issue", ["memory__*", "github__*"]));
        assert!(!matches_any("github__create_issue", ["memory__*", "slack__*"]));
    }

    /// Cross-validates against an anchored regex with `*` expanded to
    /// `.*`, per the equivalence property in the testable-properties list.
    #[test]
    fn equivalent_to_anchored_regex() {
        let cases = [
            ("github__create_issue", "github__*"),
            ("github__create_issue", "*__create_issue"),
            ("memory__read_note", "github__*"),
            ("a", "*"),
            ("", "*"),
            ("abc", "a*c"),
            ("abXYZc", "a*c"),
            ("ac", "a*c"),
            ("a.b", "a.b"),
            ("a.b", "a*b"),
            ("aXb", "a.b"),
        ];

        for (name, pattern) in cases {
            let mut regex_pattern = String::from("^");
            for (i, segment) in pattern.split('*').enumerate() {
                if i > 0 {
                    regex_pattern.push_str(".*");
                }
                regex_pattern.push_str(&regex::escape(segment));
            }
            regex_pattern.push('$');

            let re = regex::Regex::new(&regex_pattern).unwrap();
            assert_eq!(
                matches_pattern(name, pattern),
                re.is_match(name),
                "name={name:?} pattern={pattern:?}"
            );
        }
    }
}
