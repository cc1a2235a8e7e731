//! Finding catalog codes inside free-form names.
//!
//! A code such as `ABC-123` is found in `abc123`, `ABC_123` and
//! `[Studio] ABC 123 Title`, but never glued to further letters or digits:
//! `ABC-12` does not match inside `ABC-123`.

use regex_lite::Regex;

/// Compiled alternation of one or more codes, longest first.
#[derive(Debug, Clone)]
pub struct CodePattern {
    regex: Regex,
}

impl CodePattern {
    /// Returns `None` when no code has any letters or digits.
    pub fn new<'a>(codes: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut alternatives: Vec<String> = codes
            .into_iter()
            .map(code_alternative)
            .filter(|a| !a.is_empty())
            .collect();
        if alternatives.is_empty() {
            return None;
        }
        alternatives.sort_by_key(|a| std::cmp::Reverse(a.len()));
        alternatives.dedup();

        let pattern = format!(
            r"(?i)(?:^|[^a-z0-9])({})(?:$|[^a-z0-9])",
            alternatives.join("|")
        );
        Regex::new(&pattern).ok().map(|regex| Self { regex })
    }

    /// Every code occurrence in `haystack`, left to right.
    ///
    /// The search resumes right after each code, so a separator shared by two
    /// adjacent codes counts as the boundary of both.
    pub fn find_iter<'h>(&self, haystack: &'h str) -> impl Iterator<Item = &'h str> + use<'_, 'h> {
        let mut pos = 0;
        std::iter::from_fn(move || {
            if pos > haystack.len() {
                return None;
            }
            let found = self.regex.captures_at(haystack, pos)?.get(1)?;
            pos = found.end();
            Some(found.as_str())
        })
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

/// Regex fragment for one code with optional separators between its runs of
/// letters and digits.
pub(crate) fn code_alternative(code: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = None;

    for c in code.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            current_is_digit = None;
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if current_is_digit.is_some_and(|d| d != is_digit) {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
        current_is_digit = Some(is_digit);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts.join("[-_ ]?")
}

/// Uppercase alphanumerics only; equal for every spelling of one code.
pub(crate) fn squash(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
