//! Output repair — turns the raw text-model payload into a JSON object.
//!
//! Two stages: a strict `serde_json` parse (the common path), then a single
//! syntactic repair pass for the usual model mistakes: unescaped quotes inside
//! strings, raw newlines, trailing commas, missing closers, markdown fences, and
//! chatter around the object. The pass never rewrites the value of a string that
//! already parses; it only touches delimiters and escapes.

use serde_json::Value;

/// Characters of raw payload kept for diagnostics.
pub const SNIPPET_CHARS: usize = 200;

/// Result of parsing a model payload.
#[derive(Debug)]
pub enum ParseOutcome {
    /// Strict parse succeeded.
    Valid(Value),
    /// Strict parse failed; the repaired text parsed into a non-empty object.
    Repaired(Value),
    /// Neither stage produced a usable object.
    Unrepairable(RepairFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairFailure {
    /// Why the payload was rejected: the strict parse error, plus the repair error if any.
    pub reason: String,
    /// First `SNIPPET_CHARS` characters of the raw payload.
    pub snippet: String,
}

impl ParseOutcome {
    pub fn is_repaired(&self) -> bool {
        matches!(self, ParseOutcome::Repaired(_))
    }

    pub fn into_result(self) -> Result<Value, RepairFailure> {
        match self {
            ParseOutcome::Valid(value) | ParseOutcome::Repaired(value) => Ok(value),
            ParseOutcome::Unrepairable(failure) => Err(failure),
        }
    }
}

/// Parses `raw`, repairing it if the strict parse fails.
pub fn parse_model_output(raw: &str) -> ParseOutcome {
    let strict_error = match serde_json::from_str::<Value>(raw) {
        Ok(value) => return ParseOutcome::Valid(value),
        Err(e) => e,
    };

    let failure = |detail: String| {
        ParseOutcome::Unrepairable(RepairFailure {
            reason: format!("{strict_error}; repair: {detail}"),
            snippet: raw.chars().take(SNIPPET_CHARS).collect(),
        })
    };

    let Some(repaired) = repair_json(raw) else {
        return failure("no JSON object found".to_string());
    };

    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(map)) if !map.is_empty() => ParseOutcome::Repaired(Value::Object(map)),
        Ok(Value::Object(_)) => failure("repaired object is empty".to_string()),
        Ok(_) => failure("repaired payload is not an object".to_string()),
        Err(e) => failure(e.to_string()),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    let stripped = stripped.trim_start();
    stripped
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(stripped)
}

/// Open container on the repair stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// `awaiting_key` is true after `{` or `,` and false after `:`.
    Object { awaiting_key: bool },
    Array,
}

impl Frame {
    fn closer(self) -> char {
        match self {
            Frame::Object { .. } => '}',
            Frame::Array => ']',
        }
    }
}

/// Where the string being scanned sits, which decides what may legally follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Key,
    ObjectValue,
    ArrayItem,
}

/// Rewrites `raw` into text that should parse as a single JSON object.
/// Returns `None` when there is no `{` to start from.
fn repair_json(raw: &str) -> Option<String> {
    let text = strip_json_fences(raw);
    let start = text.find('{')?;
    let chars: Vec<char> = text[start..].chars().collect();

    let mut out = String::with_capacity(chars.len() + 16);
    let mut stack: Vec<Frame> = Vec::new();
    let mut string_at: Option<Position> = None;
    // Output offset of a key that has not yet been followed by `:`.
    let mut pending_key: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(position) = string_at {
            match c {
                '\\' => match chars.get(i + 1) {
                    Some(&next) if is_escape(next) => {
                        out.push('\\');
                        out.push(next);
                        i += 1;
                    }
                    _ => out.push_str("\\\\"),
                },
                '"' => {
                    if closes_string(&chars, i + 1, position) {
                        string_at = None;
                        out.push('"');
                    } else {
                        out.push_str("\\\"");
                    }
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => {}
                c => out.push(c),
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                let position = match stack.last() {
                    Some(Frame::Object { awaiting_key: true }) => {
                        pending_key = Some(out.len());
                        Position::Key
                    }
                    Some(Frame::Array) => Position::ArrayItem,
                    _ => Position::ObjectValue,
                };
                string_at = Some(position);
                out.push('"');
            }
            ':' => {
                if let Some(Frame::Object { awaiting_key }) = stack.last_mut() {
                    *awaiting_key = false;
                }
                pending_key = None;
                out.push(c);
            }
            ',' => {
                if let Some(Frame::Object { awaiting_key }) = stack.last_mut() {
                    *awaiting_key = true;
                }
                out.push(c);
            }
            '{' => {
                stack.push(Frame::Object { awaiting_key: true });
                out.push(c);
            }
            '[' => {
                stack.push(Frame::Array);
                out.push(c);
            }
            '}' | ']' => {
                // Stray closers that do not match the innermost open delimiter are dropped.
                if let Some(frame) = stack.last().copied().filter(|f| f.closer() == c) {
                    close_container(&mut out, frame, &mut pending_key);
                    stack.pop();
                    if stack.is_empty() {
                        // Root object closed: anything after it is trailing chatter.
                        return Some(out);
                    }
                }
            }
            c => out.push(c),
        }
        i += 1;
    }

    // Truncated payload: finish whatever is still open.
    if string_at.is_some() {
        out.push('"');
    }
    while let Some(frame) = stack.pop() {
        close_container(&mut out, frame, &mut pending_key);
    }
    Some(out)
}

fn is_escape(c: char) -> bool {
    matches!(c, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')
}

fn next_significant(chars: &[char], from: usize) -> Option<(usize, char)> {
    chars
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, c)| !c.is_whitespace())
        .map(|(at, &c)| (at, c))
}

/// Decides whether the quote just before `from` ends the current string.
///
/// Keys end at `:`. Values end at a closer, or at a comma that is followed by
/// something that can start the next member: a quoted key with its `:` inside
/// objects, any value inside arrays. Anything else is a stray quote.
fn closes_string(chars: &[char], from: usize, position: Position) -> bool {
    let Some((at, next)) = next_significant(chars, from) else {
        return true;
    };

    match (position, next) {
        (Position::Key, c) => matches!(c, ':' | ',' | '}'),
        (_, '}' | ']') => true,
        (Position::ObjectValue, ',') => match next_significant(chars, at + 1) {
            None | Some((_, '}')) => true,
            Some((quote, '"')) => is_quoted_key(chars, quote),
            Some(_) => false,
        },
        (Position::ArrayItem, ',') => next_significant(chars, at + 1).map_or(true, |(_, c)| {
            matches!(c, '"' | '{' | '[' | ']' | '-' | '0'..='9' | 't' | 'f' | 'n')
        }),
        _ => false,
    }
}

/// True when the string opening at `quote` is followed by `:`, or runs to the end
/// of a truncated payload.
fn is_quoted_key(chars: &[char], quote: usize) -> bool {
    let mut i = quote + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return next_significant(chars, i + 1).map_or(true, |(_, c)| c == ':'),
            _ => i += 1,
        }
    }
    true
}

/// Appends the frame's closer after dropping a key that never got its `:`,
/// removing a trailing comma, and completing a dangling `key:` with `null`.
fn close_container(out: &mut String, frame: Frame, pending_key: &mut Option<usize>) {
    if let Frame::Object { .. } = frame {
        if let Some(at) = pending_key.take() {
            out.truncate(at);
        }
    }
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    }
    if out.ends_with(':') {
        out.push_str("null");
    }
    out.push(frame.closer());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const VALID: &str = r##"{"text": {"caption": "Hello", "hashtags": ["#a"]}, "image": {}, "video": {}}"##;

    #[test]
    fn test_valid_payload_takes_fast_path() {
        let outcome = parse_model_output(VALID);
        let expected: Value = serde_json::from_str(VALID).unwrap();
        match outcome {
            ParseOutcome::Valid(value) => assert_eq!(value, expected),
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn test_unescaped_quote_inside_value_is_recovered() {
        let raw = r##"{"caption": "The "fresh" look", "hashtags": ["#a"]}"##;
        let outcome = parse_model_output(raw);
        assert!(outcome.is_repaired());
        let value = outcome.into_result().unwrap();
        assert_eq!(value["caption"], "The \"fresh\" look");
        assert_eq!(value["hashtags"], json!(["#a"]));
    }

    #[test]
    fn test_single_stray_quote_is_recovered() {
        let raw = r#"{"caption": "Grab 12" pots today", "tone": "warm"}"#;
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value["caption"], "Grab 12\" pots today");
        assert_eq!(value["tone"], "warm");
    }

    #[test]
    fn test_stray_quote_before_comma_is_recovered() {
        let raw = r#"{"caption": "Buy 3", get one free", "tone": "warm"}"#;
        let outcome = parse_model_output(raw);
        assert!(outcome.is_repaired());
        let value = outcome.into_result().unwrap();
        assert_eq!(value["caption"], "Buy 3\", get one free");
        assert_eq!(value["tone"], "warm");
    }

    #[test]
    fn test_stray_quote_before_colon_in_value_is_recovered() {
        let raw = r#"{"caption": "Ratio 3": 1 water", "tone": "warm"}"#;
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value["caption"], "Ratio 3\": 1 water");
        assert_eq!(value["tone"], "warm");
    }

    #[test]
    fn test_string_array_items_still_close_on_comma() {
        let raw = r##"{"hashtags": ["#a", "#b", 3], "note": "say "hi", then go"}"##;
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value["hashtags"], json!(["#a", "#b", 3]));
        assert_eq!(value["note"], "say \"hi\", then go");
    }

    #[test]
    fn test_markdown_fences_and_chatter_are_stripped() {
        let raw = "```json\n{\"a\": 1, \"b\": [1, 2,],}\n```";
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value, json!({ "a": 1, "b": [1, 2] }));

        let raw = "Sure! Here it is: {\"a\": \"x\"} Hope this helps.";
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value, json!({ "a": "x" }));
    }

    #[test]
    fn test_truncated_payload_is_closed() {
        let raw = r##"{"text": {"caption": "Hello", "hashtags": ["#a", "#b"##;
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value, json!({ "text": { "caption": "Hello", "hashtags": ["#a", "#b"] } }));
    }

    #[test]
    fn test_dangling_key_becomes_null_not_dropped() {
        let raw = r#"{"text": {"caption": "Hi"}, "video":"#;
        let value = parse_model_output(raw).into_result().unwrap();
        assert!(value.as_object().unwrap().contains_key("video"));
        assert!(value["video"].is_null());
    }

    #[test]
    fn test_payload_cut_inside_key_keeps_parsed_fields() {
        let raw = r#"{"text": {"caption": "Hi", "hashtags": []}, "vid"#;
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value, json!({ "text": { "caption": "Hi", "hashtags": [] } }));

        let raw = r#"{"text": {"caption": "Hi"}, "video""#;
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value, json!({ "text": { "caption": "Hi" } }));
    }

    #[test]
    fn test_raw_newline_inside_string_is_escaped() {
        let raw = "{\"script\": \"line one\nline two\"}";
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value["script"], "line one\nline two");
    }

    #[test]
    fn test_stray_closer_is_dropped() {
        let raw = r#"{"a": [1, 2]], "b": 3}"#;
        let value = parse_model_output(raw).into_result().unwrap();
        assert_eq!(value, json!({ "a": [1, 2], "b": 3 }));
    }

    #[test]
    fn test_empty_payload_is_unrepairable() {
        match parse_model_output("") {
            ParseOutcome::Unrepairable(failure) => assert!(failure.snippet.is_empty()),
            other => panic!("expected Unrepairable, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_object_after_repair_is_unrepairable() {
        assert!(matches!(parse_model_output("{,}"), ParseOutcome::Unrepairable(_)));
    }

    #[test]
    fn test_garbage_is_unrepairable_with_bounded_snippet() {
        let raw = "I'm sorry, I cannot help with that. ".repeat(20);
        match parse_model_output(&raw) {
            ParseOutcome::Unrepairable(failure) => {
                assert_eq!(failure.snippet.chars().count(), SNIPPET_CHARS);
                assert!(raw.starts_with(&failure.snippet));
                assert!(!failure.reason.is_empty());
            }
            other => panic!("expected Unrepairable, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_scalar_is_returned_as_is() {
        // Shape checks happen in the schema step, not here.
        assert!(matches!(parse_model_output("[1, 2]"), ParseOutcome::Valid(_)));
    }

    #[test]
    fn test_strip_json_fences_variants() {
        assert_eq!(strip_json_fences("```json\n{\"k\": 1}\n```"), "{\"k\": 1}");
        assert_eq!(strip_json_fences("```\n{\"k\": 1}\n```"), "{\"k\": 1}");
        assert_eq!(strip_json_fences("{\"k\": 1}"), "{\"k\": 1}");
    }
}
