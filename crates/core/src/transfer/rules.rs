//! Rule templates: `{variable}` expansion against resolved metadata.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::metadata::MovieDetail;

use super::filename::FileAttributes;

const UNKNOWN: &str = "Unknown";

/// Variables a template can reference.
#[derive(Debug, Clone)]
pub struct RuleContext {
    values: HashMap<&'static str, String>,
}

impl RuleContext {
    /// `original_title` is the title before translation.
    pub fn new(
        detail: &MovieDetail,
        original_title: &str,
        attrs: &FileAttributes,
        code: &str,
        max_title_len: usize,
    ) -> Self {
        let mut values = HashMap::new();
        let number = if detail.number.is_empty() {
            code
        } else {
            detail.number.as_str()
        };

        values.insert("number", number.to_string());
        values.insert("title", truncate(&detail.title, max_title_len));
        values.insert("original_title", truncate(original_title, max_title_len));
        values.insert(
            "actor",
            detail.actors.first().cloned().unwrap_or_default(),
        );
        values.insert("actors", detail.actors.join(","));
        values.insert("director", detail.director.clone());
        values.insert("studio", detail.maker.clone());
        values.insert("publisher", detail.label.clone());
        values.insert("series", detail.series.clone());
        values.insert("year", detail.year().unwrap_or_default().to_string());
        values.insert("release", detail.release_date.clone().unwrap_or_default());
        values.insert(
            "runtime",
            if detail.runtime > 0 {
                detail.runtime.to_string()
            } else {
                String::new()
            },
        );
        values.insert("letters", attrs.letters.clone());
        values.insert("tags", attrs.tags().join(","));

        Self { values }
    }

    /// Expand `{name}` references. Empty values become `Unknown`, except
    /// `{suffix}` which is allowed to vanish. Unknown names are left as is.
    pub fn expand(&self, template: &str, suffix: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };

            let name = &after[..close];
            if name == "suffix" {
                out.push_str(suffix);
            } else {
                match self.values.get(name) {
                    Some(value) if !value.trim().is_empty() => out.push_str(value),
                    Some(_) => out.push_str(UNKNOWN),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        out
    }

    /// Expand a `/`-separated directory rule into a relative path.
    pub fn directory(&self, rule: &str, suffix: &str) -> PathBuf {
        rule.split('/')
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| sanitize_component(&self.expand(segment, suffix)))
            .collect()
    }

    /// Expand the file stem rule into a single path component.
    pub fn file_stem(&self, rule: &str, suffix: &str) -> String {
        sanitize_component(&self.expand(rule, suffix))
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return value.trim().to_string();
    }
    value.trim().chars().take(max_chars).collect::<String>().trim_end().to_string()
}

/// Make a string safe as one path component.
pub fn sanitize_component(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == ' ');

    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}
