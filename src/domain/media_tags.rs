//! Media tags embedded in generated replies: `[VIDEO:demo]`, `[SEND_IMAGE:price]`.
//!
//! Tags are extracted in order of appearance and stripped from the text that
//! is shown to the counterpart.

use crate::domain::MediaKind;
use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:SEND_)?(VIDEO|IMAGE|DOCUMENT):([^\]]+)\]").expect("valid media tag regex")
});
static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid blank line regex"));
static MULTI_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"  +").expect("valid space regex"));

/// A tag found in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTag {
    pub kind: MediaKind,
    pub name: String,
}

/// Split a raw reply into display text and the tags it carries.
pub fn parse(text: &str) -> (String, Vec<MediaTag>) {
    let tags = TAG_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let kind = MediaKind::parse(cap.get(1)?.as_str())?;
            let name = cap.get(2)?.as_str().trim().to_string();
            Some(MediaTag { kind, name })
        })
        .collect();
    (strip(text), tags)
}

/// Remove every tag and collapse the blank lines and double spaces left behind.
///
/// Text without tags is returned unchanged.
pub fn strip(text: &str) -> String {
    if !TAG_RE.is_match(text) {
        return text.to_string();
    }
    let removed = TAG_RE.replace_all(text, "");
    let trimmed = removed.trim();
    let collapsed = BLANK_LINES_RE.replace_all(trimmed, "\n");
    MULTI_SPACE_RE.replace_all(&collapsed, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extracts_tags_in_order() {
        let (clean, tags) = parse("Here you go [VIDEO:demo] and [SEND_DOCUMENT:price list]");
        assert_eq!(clean, "Here you go and");
        assert_eq!(
            tags,
            vec![
                MediaTag {
                    kind: MediaKind::Video,
                    name: "demo".into()
                },
                MediaTag {
                    kind: MediaKind::Document,
                    name: "price list".into()
                },
            ]
        );
    }

    #[test]
    fn test_strip_trims_trailing_tag() {
        assert_eq!(strip("Here you go [VIDEO:demo]"), "Here you go");
    }

    #[test]
    fn test_strip_collapses_blank_lines() {
        let text = "First line\n[IMAGE:cat]\n\nSecond line";
        assert_eq!(strip(text), "First line\nSecond line");
    }

    #[test]
    fn test_text_without_tags_is_unchanged() {
        let text = "  spaced   text \n\n kept as is ";
        let (clean, tags) = parse(text);
        assert_eq!(clean, text);
        assert!(tags.is_empty());
        assert_eq!(strip(&strip(text)), text);
    }

    #[test]
    fn test_unknown_kind_is_not_a_tag() {
        let (clean, tags) = parse("see [AUDIO:song]");
        assert_eq!(clean, "see [AUDIO:song]");
        assert!(tags.is_empty());
    }

    #[test]
    fn test_tag_only_reply_is_empty() {
        let (clean, tags) = parse("[IMAGE:menu]");
        assert!(clean.is_empty());
        assert_eq!(tags.len(), 1);
    }
}
