//! Structural attributes read from a release file name.

use std::path::Path;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;

/// Letter groups that look like codes but are part or quality markers.
const NOT_CODE_LETTERS: &[&str] = &["CD", "PT", "PART", "DISC", "MP", "FHD", "HD", "AAC", "DTS"];

static FC2_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)fc2[-_ ]*(?:ppv[-_ ]*)?(\d{5,8})").unwrap());
static HEYZO_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)heyzo[-_ ]*(\d{3,5})").unwrap());
static NUMERIC_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(\d{6})[-_](\d{2,3})(?:[^0-9]|$)").unwrap());
static LETTERED_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z])([a-z]{2,6})[-_ ]?(\d{2,5})(?:([^0-9])|$)").unwrap()
});
static PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[-_ .](?:cd|pt|part|disc)[-_ ]?(\d{1,2})(?:[^0-9]|$)").unwrap()
});
static UNCENSORED_LEAK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d[-_]uc(?:[^a-z0-9]|$)").unwrap());
static UNCENSORED_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d[-_]u(?:[^a-z0-9]|$)").unwrap());
static SUBTITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d[-_]c(?:[^a-z0-9]|$)").unwrap());
static SUBTITLE_CH_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\d|[-_ .\[])ch(?:[^a-z]|$)").unwrap());

/// Corner mark selected by a file attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Subtitle,
    Leaked,
    Uncensored,
    UncensoredLeak,
    Mosaic,
}

impl MarkKind {
    /// Stem of the mark image in the marks directory.
    pub fn file_stem(&self) -> &'static str {
        match self {
            MarkKind::Subtitle => "sub",
            MarkKind::Leaked => "leak",
            MarkKind::Uncensored => "uncensored",
            MarkKind::UncensoredLeak => "hack",
            MarkKind::Mosaic => "mosaic",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileAttributes {
    /// Normalized code, e.g. `ABC-123`, `FC2-PPV-1234567`, `010121_001`.
    pub code: String,
    /// Uppercase letter prefix of the code; empty for numeric codes.
    pub letters: String,
    /// `-CD1`, `pt2`, ...
    pub part: Option<u32>,
    pub chinese_subtitle: bool,
    pub leaked: bool,
    pub uncensored: bool,
    pub uncensored_leak: bool,
    pub mosaic: bool,
}

impl FileAttributes {
    /// Marker appended to file names through `{suffix}`.
    pub fn suffix(&self) -> String {
        let mut suffix = String::new();
        if let Some(part) = self.part {
            suffix.push_str(&format!("-cd{}", part));
        }
        if self.chinese_subtitle {
            suffix.push_str("-C");
        }
        if self.uncensored_leak {
            suffix.push_str("-UC");
        } else if self.uncensored {
            suffix.push_str("-U");
        }
        suffix
    }

    /// Human readable tags for the NFO and `{tags}`.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.chinese_subtitle {
            tags.push("Chinese Subtitles");
        }
        if self.leaked {
            tags.push("Leaked");
        }
        if self.uncensored_leak {
            tags.push("Uncensored Leak");
        } else if self.uncensored {
            tags.push("Uncensored");
        }
        if self.mosaic {
            tags.push("Mosaic");
        }
        tags
    }

    /// Marks to draw on artwork, in placement order.
    pub fn marks(&self) -> Vec<MarkKind> {
        let mut marks = Vec::new();
        if self.chinese_subtitle {
            marks.push(MarkKind::Subtitle);
        }
        if self.uncensored_leak {
            marks.push(MarkKind::UncensoredLeak);
        } else {
            if self.leaked {
                marks.push(MarkKind::Leaked);
            }
            if self.uncensored {
                marks.push(MarkKind::Uncensored);
            }
        }
        if self.mosaic {
            marks.push(MarkKind::Mosaic);
        }
        marks
    }
}

/// Parse a file name (with or without directories and extension).
///
/// Returns `None` when no code can be found.
pub fn parse_filename(file_name: &str) -> Option<FileAttributes> {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())?;
    // "site.example@ABC-123" style prefixes
    let stem = match stem.rfind('@') {
        Some(idx) => stem[idx + 1..].to_string(),
        None => stem,
    };
    let lower = stem.to_lowercase();

    let (code, letters) = extract_code(&stem)?;

    let uncensored_leak = UNCENSORED_LEAK_TAG.is_match(&stem)
        || lower.contains("hack")
        || lower.contains("破解");

    Some(FileAttributes {
        code,
        letters,
        part: extract_part(&stem),
        chinese_subtitle: SUBTITLE_TAG.is_match(&stem)
            || SUBTITLE_CH_TAG.is_match(&stem)
            || lower.contains("中文字幕"),
        leaked: lower.contains("leak") || lower.contains("流出"),
        uncensored: UNCENSORED_TAG.is_match(&stem)
            || lower.contains("uncensored")
            || lower.contains("无码"),
        uncensored_leak,
        mosaic: lower.contains("mosaic") || lower.contains("有码"),
    })
}

/// Uppercase leading letters of a code (`abc-123` → `ABC`).
pub fn code_letters(code: &str) -> String {
    code.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn extract_code(stem: &str) -> Option<(String, String)> {
    if let Some(digits) = first_group(&FC2_CODE, stem) {
        return Some((format!("FC2-PPV-{}", digits), "FC2".to_string()));
    }

    if let Some(digits) = first_group(&HEYZO_CODE, stem) {
        return Some((format!("HEYZO-{}", digits), "HEYZO".to_string()));
    }

    if let Some(caps) = NUMERIC_CODE.captures(stem) {
        if let (Some(date), Some(seq)) = (caps.get(1), caps.get(2)) {
            return Some((format!("{}_{}", date.as_str(), seq.as_str()), String::new()));
        }
    }

    for caps in LETTERED_CODE.captures_iter(stem) {
        let (Some(letters), Some(digits)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let letters = letters.as_str().to_ascii_uppercase();
        if NOT_CODE_LETTERS.contains(&letters.as_str()) {
            continue;
        }
        // 1080p, 720P
        if caps
            .get(3)
            .is_some_and(|next| next.as_str().eq_ignore_ascii_case("p"))
        {
            continue;
        }
        return Some((format!("{}-{}", letters, digits.as_str()), letters));
    }

    None
}

fn first_group(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_part(stem: &str) -> Option<u32> {
    first_group(&PART, stem).and_then(|digits| digits.parse::<u32>().ok())
}
