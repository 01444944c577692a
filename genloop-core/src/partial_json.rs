//! Best-effort parsing of truncated JSON documents.
//!
//! Streaming structured output arrives as a growing text buffer that is
//! almost never valid JSON mid-stream. [`parse_partial_json`] extracts the
//! richest valid value obtainable by closing open strings, arrays, and
//! objects at the tail and discarding dangling separators or half-written
//! literals. It is a total function: it returns `None` only when no value
//! is recoverable, and every returned value is itself well-formed JSON.
//!
//! Callers should not assume monotonicity between invocations on growing
//! buffers; re-parsing may re-interpret earlier content. The output partial
//! parsers de-duplicate by structural equality before publishing.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Expect {
    KeyOrClose,
    Key,
    Colon,
    ObjectValue,
    ObjectCommaOrClose,
    ValueOrClose,
    ArrayValue,
    ArrayCommaOrClose,
}

#[derive(Debug, Clone)]
struct Frame {
    container: u8,
    expect: Expect,
}

/// Byte index up to which the document is cleanly truncatable, plus the
/// containers open at that point.
#[derive(Debug, Clone)]
struct Snapshot {
    end: usize,
    containers: Vec<u8>,
}

fn closers(containers: &[u8]) -> String {
    containers
        .iter()
        .rev()
        .map(|c| if *c == b'{' { '}' } else { ']' })
        .collect()
}

fn containers_of(frames: &[Frame]) -> Vec<u8> {
    frames.iter().map(|f| f.container).collect()
}

fn try_parse(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate).ok()
}

/// Parses a possibly truncated JSON document into the richest valid value.
pub fn parse_partial_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(value) = try_parse(trimmed) {
        return Some(value);
    }

    let mut frames: Vec<Frame> = Vec::new();
    // Some((is_key, string_start_byte))
    let mut in_string: Option<(bool, usize)> = None;
    let mut escape = false;
    let mut token_start: Option<usize> = None;
    let mut snapshot: Option<Snapshot> = None;

    fn value_done(frames: &mut [Frame]) {
        if let Some(frame) = frames.last_mut() {
            frame.expect = if frame.container == b'{' {
                Expect::ObjectCommaOrClose
            } else {
                Expect::ArrayCommaOrClose
            };
        }
    }

    let bytes = trimmed.as_bytes();
    for (i, c) in trimmed.char_indices() {
        if let Some((is_key, _)) = in_string {
            if escape {
                escape = false;
                continue;
            }
            match c {
                '\\' => escape = true,
                '"' => {
                    in_string = None;
                    if is_key {
                        if let Some(frame) = frames.last_mut() {
                            frame.expect = Expect::Colon;
                        }
                    } else {
                        value_done(&mut frames);
                        snapshot = Some(Snapshot {
                            end: i + 1,
                            containers: containers_of(&frames),
                        });
                    }
                }
                _ => {}
            }
            continue;
        }

        if token_start.is_some() {
            if matches!(c, ',' | '}' | ']' | ' ' | '\t' | '\n' | '\r') {
                // Scalar token ends here; mid-document tokens are complete.
                token_start = None;
                value_done(&mut frames);
                snapshot = Some(Snapshot {
                    end: i,
                    containers: containers_of(&frames),
                });
            } else {
                continue;
            }
        }

        match c {
            ' ' | '\t' | '\n' | '\r' => {}
            '{' => {
                frames.push(Frame {
                    container: b'{',
                    expect: Expect::KeyOrClose,
                });
                snapshot = Some(Snapshot {
                    end: i + 1,
                    containers: containers_of(&frames),
                });
            }
            '[' => {
                frames.push(Frame {
                    container: b'[',
                    expect: Expect::ValueOrClose,
                });
                snapshot = Some(Snapshot {
                    end: i + 1,
                    containers: containers_of(&frames),
                });
            }
            '}' | ']' => {
                frames.pop();
                value_done(&mut frames);
                snapshot = Some(Snapshot {
                    end: i + 1,
                    containers: containers_of(&frames),
                });
            }
            '"' => {
                let is_key = matches!(
                    frames.last().map(|f| f.expect),
                    Some(Expect::KeyOrClose) | Some(Expect::Key)
                );
                in_string = Some((is_key, i));
            }
            ':' => {
                if let Some(frame) = frames.last_mut() {
                    frame.expect = Expect::ObjectValue;
                }
            }
            ',' => {
                if let Some(frame) = frames.last_mut() {
                    frame.expect = if frame.container == b'{' {
                        Expect::Key
                    } else {
                        Expect::ArrayValue
                    };
                }
            }
            _ => token_start = Some(i),
        }
    }

    let suffix = closers(&containers_of(&frames));

    // Truncated inside a string value: close the quote and the open
    // containers. Invalid tails (half escapes) are trimmed back a few
    // characters until the result parses.
    if let Some((false, string_start)) = in_string {
        let mut end = trimmed.len();
        if escape {
            end -= 1;
        }
        let mut boundaries: Vec<usize> = trimmed
            .char_indices()
            .map(|(i, _)| i)
            .filter(|i| *i > string_start && *i < end)
            .collect();
        boundaries.push(end);
        let mut attempts = 0;
        for cut in boundaries.into_iter().rev() {
            if attempts > 8 {
                break;
            }
            attempts += 1;
            let candidate = format!("{}\"{}", &trimmed[..cut], suffix);
            if let Some(value) = try_parse(&candidate) {
                return Some(value);
            }
        }
        // Unrecoverable string; drop back to the last clean boundary.
        return finish_from_snapshot(trimmed, snapshot);
    }
    if let Some((true, _)) = in_string {
        return finish_from_snapshot(trimmed, snapshot);
    }

    // Truncated inside a scalar token.
    if let Some(start) = token_start {
        let token = &trimmed[start..];
        if try_parse(token).is_some() {
            // Complete literal or number ending exactly at EOF.
            return try_parse(&format!("{}{}", trimmed, suffix))
                .or_else(|| finish_from_snapshot(trimmed, snapshot));
        }
        if bytes[start].is_ascii_digit() || bytes[start] == b'-' {
            for len in (1..token.len()).rev() {
                if try_parse(&token[..len]).is_some() {
                    let candidate = format!("{}{}", &trimmed[..start + len], suffix);
                    if let Some(value) = try_parse(&candidate) {
                        return Some(value);
                    }
                    break;
                }
            }
        }
        // Half-written literal such as `tr` or `nul`.
        return finish_from_snapshot(trimmed, snapshot);
    }

    // Clean boundary: closable iff no separator or key is dangling.
    let closable = match frames.last().map(|f| f.expect) {
        None => true,
        Some(Expect::KeyOrClose)
        | Some(Expect::ObjectCommaOrClose)
        | Some(Expect::ValueOrClose)
        | Some(Expect::ArrayCommaOrClose) => true,
        _ => false,
    };
    if closable {
        if let Some(value) = try_parse(&format!("{}{}", trimmed, suffix)) {
            return Some(value);
        }
    }
    finish_from_snapshot(trimmed, snapshot)
}

fn finish_from_snapshot(text: &str, snapshot: Option<Snapshot>) -> Option<Value> {
    let snapshot = snapshot?;
    let candidate = format!("{}{}", &text[..snapshot.end], closers(&snapshot.containers));
    try_parse(&candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(text: &str) -> Value {
        parse_partial_json(text).unwrap_or_else(|| panic!("no value recovered from {text:?}"))
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_partial_json(""), None);
        assert_eq!(parse_partial_json("   \n"), None);
    }

    #[test]
    fn test_complete_documents_pass_through() {
        assert_eq!(parsed(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parsed("[1, 2, 3]"), json!([1, 2, 3]));
        assert_eq!(parsed("\"hello\""), json!("hello"));
        assert_eq!(parsed("42"), json!(42));
        assert_eq!(parsed("null"), json!(null));
        assert_eq!(parsed("true"), json!(true));
    }

    #[test]
    fn test_bare_openers() {
        assert_eq!(parsed("{"), json!({}));
        assert_eq!(parsed("["), json!([]));
        assert_eq!(parsed("[{"), json!([{}]));
    }

    #[test]
    fn test_open_object_values() {
        assert_eq!(parsed(r#"{"a": 1"#), json!({"a": 1}));
        assert_eq!(parsed(r#"{"a": 1, "b": 2"#), json!({"a": 1, "b": 2}));
        assert_eq!(parsed(r#"{"a": true"#), json!({"a": true}));
    }

    #[test]
    fn test_dangling_key_is_dropped() {
        assert_eq!(parsed(r#"{"a""#), json!({}));
        assert_eq!(parsed(r#"{"a":"#), json!({}));
        assert_eq!(parsed(r#"{"na"#), json!({}));
        assert_eq!(parsed(r#"{"a": 1, "b""#), json!({"a": 1}));
        assert_eq!(parsed(r#"{"a": 1, "b":"#), json!({"a": 1}));
    }

    #[test]
    fn test_dangling_comma_is_dropped() {
        assert_eq!(parsed("[1,"), json!([1]));
        assert_eq!(parsed("[1, "), json!([1]));
        assert_eq!(parsed(r#"{"a": 1,"#), json!({"a": 1}));
    }

    #[test]
    fn test_open_string_value_is_closed() {
        assert_eq!(parsed(r#""hel"#), json!("hel"));
        assert_eq!(parsed(r#"{"a": "b"#), json!({"a": "b"}));
        assert_eq!(
            parsed(r#"{"name": "Ear"#),
            json!({"name": "Ear"})
        );
    }

    #[test]
    fn test_open_string_with_trailing_escape() {
        assert_eq!(parsed(r#"{"a": "b\"#), json!({"a": "b"}));
        assert_eq!(parsed(r#"{"a": "say \"hi"#), json!({"a": "say \"hi"}));
    }

    #[test]
    fn test_half_written_literals_are_dropped() {
        assert_eq!(parsed(r#"{"a": tr"#), json!({}));
        assert_eq!(parsed(r#"{"a": 1, "b": fal"#), json!({"a": 1}));
        assert_eq!(parse_partial_json("tru"), None);
        assert_eq!(parse_partial_json("nul"), None);
    }

    #[test]
    fn test_truncated_numbers_are_trimmed() {
        assert_eq!(parsed(r#"{"a": 1."#), json!({"a": 1}));
        assert_eq!(parsed(r#"{"a": 12e"#), json!({"a": 12}));
        assert_eq!(parsed("[1, 2"), json!([1, 2]));
        assert_eq!(parsed("12.5"), json!(12.5));
    }

    #[test]
    fn test_nested_truncation() {
        assert_eq!(
            parsed(r#"{"a": [1, {"b": "c"#),
            json!({"a": [1, {"b": "c"}]})
        );
        assert_eq!(
            parsed(r#"[{"x": 1}, {"y"#),
            json!([{"x": 1}, {}])
        );
        assert_eq!(
            parsed(r#"{"outer": {"inner": [1, 2"#),
            json!({"outer": {"inner": [1, 2]}})
        );
    }

    #[test]
    fn test_element_wrapper_truncation() {
        assert_eq!(
            parsed(r##"{"elements": [{"name": "red", "hex": "#ff0000"}, {"name": "blu"##),
            json!({"elements": [
                {"name": "red", "hex": "#ff0000"},
                {"name": "blu"}
            ]})
        );
    }

    #[test]
    fn test_unicode_content() {
        assert_eq!(parsed(r#"{"a": "héllo wörl"#), json!({"a": "héllo wörl"}));
        assert_eq!(parsed(r#"["日本語"#), json!(["日本語"]));
    }

    #[test]
    fn test_every_prefix_is_total() {
        // The parser must never panic and every recovered value must be
        // well-formed, for every prefix of a realistic document.
        let document = r#"{"name": "Earth", "moons": 1, "tags": ["blue", "rocky"], "mass": 5.97e24, "habitable": true}"#;
        for n in 0..=document.len() {
            if !document.is_char_boundary(n) {
                continue;
            }
            let prefix = &document[..n];
            if let Some(value) = parse_partial_json(prefix) {
                // Round-trips through serde, i.e. well-formed.
                let text = serde_json::to_string(&value).unwrap();
                let _: Value = serde_json::from_str(&text).unwrap();
            }
        }
    }
}
