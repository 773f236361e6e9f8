//! Response parsing for vision model replies.
//!
//! Two reply shapes are understood:
//! 1. A JSON object with `short_description`, `long_description` and `tags`
//!    (the default prompt asks for exactly this)
//! 2. Numbered or labeled text sections (`1.` / `Short description:` ...),
//!    produced by the legacy prompt
//!
//! Both are tolerant of a surrounding markdown code fence.

use crate::types::{Analysis, ResponseFormat};
use serde::Deserialize;
use serde_json::Value;

/// Parse a model reply according to the requested format.
pub fn parse_response(response: &str, format: ResponseFormat) -> Result<Analysis, ParseError> {
    match format {
        ResponseFormat::Json => parse_json(response),
        ResponseFormat::Sections => parse_sections(response),
    }
}

/// Strictly parse a JSON object reply, after removing any code fence.
///
/// Missing or null keys become empty strings. `tags` may be a string or an
/// array of strings; arrays are joined with `", "`. Anything other than a
/// top-level object is rejected.
pub fn parse_json(response: &str) -> Result<Analysis, ParseError> {
    let body = strip_code_fence(response);
    if body.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ParseError::InvalidJson(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }
    let raw: RawAnalysis =
        serde_json::from_value(value).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let tags = match raw.tags {
        None => String::new(),
        Some(Tags::Text(s)) => s.trim().to_string(),
        Some(Tags::List(list)) => list
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
    };

    Ok(Analysis {
        short_description: raw.short_description.unwrap_or_default().trim().to_string(),
        long_description: raw.long_description.unwrap_or_default().trim().to_string(),
        tags,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    short_description: Option<String>,
    #[serde(default)]
    long_description: Option<String>,
    #[serde(default)]
    tags: Option<Tags>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Tags {
    Text(String),
    List(Vec<String>),
}

/// Remove a surrounding markdown code fence, if present.
///
/// - `` ```json\n{...}\n``` `` -> `{...}`
/// - `` ```{...}``` `` -> `{...}`
/// - text without a leading fence is only trimmed
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json", "JSON", ...) on the opening line.
    let rest = match rest.find('\n') {
        Some(nl) if rest[..nl].chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') => {
            &rest[nl + 1..]
        }
        Some(_) => rest,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    let rest = match rest.rfind("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    rest.trim()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Short,
    Long,
    Tags,
}

/// Parse a reply made of three numbered or labeled sections.
///
/// A line opens a section when it starts with `1.`, `2.` or `3.`, or with a
/// `Short description:`, `Detailed description:` / `Long description:` or
/// `Tags:` heading (markdown `**`/`#` decoration is ignored). Text after the
/// marker is the section's first content; later lines are appended to the
/// open section until the next marker.
pub fn parse_sections(response: &str) -> Result<Analysis, ParseError> {
    let body = strip_code_fence(response);
    if body.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let mut short = Vec::new();
    let mut long = Vec::new();
    let mut tags = Vec::new();
    let mut current: Option<Section> = None;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let content = match section_marker(line) {
            Some((section, rest)) => {
                current = Some(section);
                rest
            }
            None => line,
        };

        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        match current {
            Some(Section::Short) => short.push(content.to_string()),
            Some(Section::Long) => long.push(content.to_string()),
            Some(Section::Tags) => {
                let item = content.trim_start_matches(['-', '*', '•']).trim();
                if !item.is_empty() {
                    tags.push(item.trim_end_matches(',').to_string());
                }
            }
            None => {}
        }
    }

    if short.is_empty() && long.is_empty() && tags.is_empty() {
        return Err(ParseError::NoSections);
    }

    Ok(Analysis {
        short_description: short.join(" "),
        long_description: long.join(" "),
        tags: tags.join(", "),
    })
}

/// Detect a section marker at the start of `line`; returns the section and
/// the text that follows it.
fn section_marker(line: &str) -> Option<(Section, &str)> {
    let undecorated = line.trim_start_matches(['#', '*', ' ']);

    for (prefix, section) in [("1.", Section::Short), ("2.", Section::Long), ("3.", Section::Tags)] {
        if let Some(rest) = undecorated.strip_prefix(prefix) {
            // "10." and friends are list items, not markers
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            return Some((section, strip_label(rest)));
        }
    }

    let (head, tail) = undecorated.split_once(':')?;
    let label = head.trim_end_matches(['*', ' ']).to_lowercase();
    let section = match label.as_str() {
        "short description" | "short" | "summary" => Section::Short,
        "detailed description" | "long description" | "description" => Section::Long,
        "tags" => Section::Tags,
        _ => return None,
    };
    Some((section, tail.trim_start_matches(['*', ' '])))
}

/// Drop a leading `Label:` after a numeric marker, when it names a field.
fn strip_label(rest: &str) -> &str {
    let rest = rest.trim_start_matches(['*', ' ']);
    if let Some((head, tail)) = rest.split_once(':') {
        let head = head.trim_end_matches(['*', ' ']).to_lowercase();
        if head.len() <= 40 && (head.contains("description") || head.contains("tags")) {
            return tail.trim_start_matches(['*', ' ']);
        }
    }
    rest
}

/// Parse error types for model replies.
#[derive(Debug)]
pub enum ParseError {
    /// The reply was empty or whitespace-only
    EmptyResponse,
    /// The reply was not a JSON object of the expected shape
    InvalidJson(String),
    /// No section markers were found
    NoSections,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::EmptyResponse => write!(f, "Empty model response"),
            ParseError::InvalidJson(e) => write!(f, "JSON parse error: {}", e),
            ParseError::NoSections => write!(f, "No description sections found in response"),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = r#"{"short_description": "A kapok tree.", "long_description": "A tall tree with buttress roots. Birds circle above.", "tags": "tree, kapok, birds"}"#;

    // ── Code fences ──

    #[test]
    fn fenced_json_parses_like_bare_json() {
        let fenced = format!("```json\n{}\n```", BARE);
        assert_eq!(parse_json(&fenced).unwrap(), parse_json(BARE).unwrap());

        let plain_fence = format!("```\n{}\n```\n", BARE);
        assert_eq!(parse_json(&plain_fence).unwrap(), parse_json(BARE).unwrap());
    }

    #[test]
    fn strip_code_fence_single_line() {
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fence_unterminated() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    // ── JSON ──

    #[test]
    fn parse_json_fields() {
        let analysis = parse_json(BARE).unwrap();
        assert_eq!(analysis.short_description, "A kapok tree.");
        assert_eq!(
            analysis.long_description,
            "A tall tree with buttress roots. Birds circle above."
        );
        assert_eq!(analysis.tags, "tree, kapok, birds");
    }

    #[test]
    fn parse_json_tag_array_is_joined() {
        let input = r#"{"short_description": "s", "long_description": "l", "tags": ["tree", " roots ", ""]}"#;
        assert_eq!(parse_json(input).unwrap().tags, "tree, roots");
    }

    #[test]
    fn parse_json_missing_keys_default_to_empty() {
        let analysis = parse_json(r#"{"short_description": "only this"}"#).unwrap();
        assert_eq!(analysis.short_description, "only this");
        assert!(analysis.long_description.is_empty());
        assert!(analysis.tags.is_empty());
    }

    #[test]
    fn parse_json_null_fields_are_empty() {
        let analysis = parse_json(
            r#"{"short_description": "a", "long_description": "b", "tags": null}"#,
        )
        .unwrap();
        assert_eq!(analysis.short_description, "a");
        assert_eq!(analysis.long_description, "b");
        assert!(analysis.tags.is_empty());

        let analysis =
            parse_json(r#"{"short_description": null, "long_description": null, "tags": "x"}"#)
                .unwrap();
        assert!(analysis.short_description.is_empty());
        assert!(analysis.long_description.is_empty());
        assert_eq!(analysis.tags, "x");
    }

    #[test]
    fn parse_json_rejects_non_objects() {
        for reply in [r#"["a", "b", "c"]"#, r#""a tree""#, "42", "null"] {
            let err = parse_json(reply).unwrap_err();
            assert!(
                matches!(&err, ParseError::InvalidJson(msg) if msg.contains("expected a JSON object")),
                "{}: {:?}",
                reply,
                err
            );
        }
    }

    #[test]
    fn parse_json_rejects_prose() {
        let err = parse_json("Here is the analysis you asked for.").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn parse_json_rejects_empty() {
        assert!(matches!(parse_json("   "), Err(ParseError::EmptyResponse)));
        assert!(matches!(parse_json("```\n```"), Err(ParseError::EmptyResponse)));
    }

    // ── Sections ──

    #[test]
    fn parse_numbered_sections() {
        let input = "1. Short description: A tree at dusk.\n2. Detailed description: The tree is tall.\nIts roots spread wide.\n3. Tags: tree, dusk, roots";
        let analysis = parse_sections(input).unwrap();
        assert_eq!(analysis.short_description, "A tree at dusk.");
        assert_eq!(analysis.long_description, "The tree is tall. Its roots spread wide.");
        assert_eq!(analysis.tags, "tree, dusk, roots");
    }

    #[test]
    fn parse_labeled_headings_with_content_on_next_line() {
        let input = "**Short description:**\nA tree at dusk.\n\n**Detailed description:**\nThe tree is tall.\nIts roots spread wide.\n\n**Tags:**\ntree, dusk";
        let analysis = parse_sections(input).unwrap();
        assert_eq!(analysis.short_description, "A tree at dusk.");
        assert_eq!(analysis.long_description, "The tree is tall. Its roots spread wide.");
        assert_eq!(analysis.tags, "tree, dusk");
    }

    #[test]
    fn parse_sections_bulleted_tags() {
        let input = "1. A tree.\n2. A tall tree.\n3. Tags:\n- tree\n- sky\n* dusk";
        let analysis = parse_sections(input).unwrap();
        assert_eq!(analysis.short_description, "A tree.");
        assert_eq!(analysis.tags, "tree, sky, dusk");
    }

    #[test]
    fn numbered_marker_keeps_colons_in_prose() {
        let input = "1. At 3:00 the tree casts a long shadow.";
        let analysis = parse_sections(input).unwrap();
        assert_eq!(analysis.short_description, "At 3:00 the tree casts a long shadow.");
    }

    #[test]
    fn text_before_first_marker_is_ignored() {
        let input = "Sure! Here you go.\n1. Short.\n2. Long.\n3. a, b";
        let analysis = parse_sections(input).unwrap();
        assert_eq!(analysis.short_description, "Short.");
        assert_eq!(analysis.long_description, "Long.");
        assert_eq!(analysis.tags, "a, b");
    }

    #[test]
    fn parse_sections_without_markers_fails() {
        assert!(matches!(
            parse_sections("just some prose\nwith two lines"),
            Err(ParseError::NoSections)
        ));
    }

    #[test]
    fn parse_response_dispatches_on_format() {
        assert!(parse_response(BARE, ResponseFormat::Json).is_ok());
        assert!(parse_response("1. a\n2. b\n3. c", ResponseFormat::Json).is_err());
        assert!(parse_response("1. a\n2. b\n3. c", ResponseFormat::Sections).is_ok());
    }
}
