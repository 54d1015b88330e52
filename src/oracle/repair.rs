//! Best-effort repair of oracle output into JSON.
//!
//! Oracle completions arrive wrapped in markdown fences, surrounded by prose,
//! with trailing commas or cut off mid-object. Each stage below fixes one of
//! those problems and is a pure `&str -> String` function; [`parse_json_array`]
//! and [`parse_json_object`] try them in sequence and stop at the first text
//! that parses.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepairError {
    #[error("no JSON could be recovered from the response")]
    Unparseable,
    #[error("expected a JSON array, got {0}")]
    NotAnArray(&'static str),
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Keys under which an object-wrapped list is accepted as the array.
const LIST_KEYS: &[&str] = &["questions", "items", "trades", "positions", "data"];

/// Return the body of the first markdown code fence, if any.
///
/// An unterminated fence (truncated output) yields everything after it.
pub fn strip_code_fences(text: &str) -> String {
    let Some(start) = text.find("```") else {
        return text.trim().to_string();
    };
    let after = &text[start + 3..];
    // Skip the language tag line, e.g. ```json
    let body = match after.find('\n') {
        Some(nl) if !after[..nl].trim().contains(['{', '[']) => &after[nl + 1..],
        _ => after,
    };
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}

/// Cut to the span from the first `open` to the last `close` bracket.
///
/// Without a closing bracket the span runs to the end of the text.
pub fn trim_to_outer_brackets(text: &str, open: char, close: char) -> String {
    let Some(start) = text.find(open) else {
        return text.to_string();
    };
    match text.rfind(close) {
        Some(end) if end > start => text[start..=end].to_string(),
        _ => text[start..].to_string(),
    }
}

/// Remove commas directly preceding `]` or `}` outside of strings.
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Close a truncated document after its last complete nested value.
///
/// Keeps everything up to the last `}` or `]` that completed inside the
/// outermost container, then appends the closing brackets still open at that
/// point.
pub fn close_truncated(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut last_complete: Option<(usize, Vec<char>)> = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => stack.push(c),
            ']' | '}' => {
                stack.pop();
                if stack.is_empty() {
                    return text[..=i].to_string();
                }
                last_complete = Some((i + c.len_utf8(), stack.clone()));
            }
            _ => {}
        }
    }

    let Some(&outer) = stack.first() else {
        return text.to_string();
    };
    let (kept, open) = match last_complete {
        Some((end, open)) => (text[..end].trim_end_matches([',', ' ', '\n']), open),
        None => ("", vec![outer]),
    };
    let closers: String = open
        .iter()
        .rev()
        .map(|&b| if b == '[' { ']' } else { '}' })
        .collect();
    if kept.is_empty() {
        format!("{}{}", outer, closers)
    } else {
        format!("{}{}", kept, closers)
    }
}

/// Parse every well-formed top-level `{…}` object found in the text.
pub fn salvage_objects(text: &str) -> Vec<Value> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;

    // Objects nested inside an outer object are salvaged from its body.
    let body = match text.trim_start().strip_prefix('{') {
        Some(_) if serde_json::from_str::<Value>(text).is_err() => {
            match text.find('[') {
                Some(idx) => &text[idx..],
                None => text,
            }
        }
        _ => text,
    };

    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        let candidate = remove_trailing_commas(&body[s..=i]);
                        if let Ok(value @ Value::Object(_)) = serde_json::from_str(&candidate) {
                            objects.push(value);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn into_array(value: Value) -> Result<Vec<Value>, RepairError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in LIST_KEYS {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Ok(items);
                }
            }
            Err(RepairError::NotAnArray("an object"))
        }
        other => Err(RepairError::NotAnArray(kind_of(&other))),
    }
}

/// Staged candidates, least invasive first.
fn candidates(raw: &str, open: char, close: char) -> Vec<String> {
    let trimmed = raw.trim().to_string();
    let unfenced = strip_code_fences(raw);
    let bracketed = trim_to_outer_brackets(&unfenced, open, close);
    let decomma = remove_trailing_commas(&bracketed);
    let closed = remove_trailing_commas(&close_truncated(&decomma));
    vec![trimmed, unfenced, bracketed, decomma, closed]
}

/// Recover a JSON array from oracle output.
///
/// An object wrapping the list under a well-known key (`questions`, `items`,
/// …) is accepted. Falls back to salvaging individual objects.
pub fn parse_json_array(raw: &str) -> Result<Vec<Value>, RepairError> {
    let mut shape_error = None;
    for candidate in candidates(raw, '[', ']') {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            match into_array(value) {
                Ok(items) => return Ok(items),
                Err(e) => shape_error = Some(e),
            }
        }
    }

    if let Some(e) = shape_error {
        return Err(e);
    }

    let salvaged = salvage_objects(&strip_code_fences(raw));
    if !salvaged.is_empty() {
        tracing::debug!(objects = salvaged.len(), "Salvaged objects from malformed array");
        return Ok(salvaged);
    }
    Err(RepairError::Unparseable)
}

/// Recover a JSON object from oracle output.
pub fn parse_json_object(raw: &str) -> Result<serde_json::Map<String, Value>, RepairError> {
    let mut shape_error = None;
    for candidate in candidates(raw, '{', '}') {
        match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(other) => shape_error = Some(RepairError::NotAnObject(kind_of(&other))),
            Err(_) => {}
        }
    }
    Err(shape_error.unwrap_or(RepairError::Unparseable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_json_fence() {
        let raw = "Hier die Fragen:\n```json\n[{\"id\": \"1\"}]\n```\nViel Erfolg!";
        assert_eq!(strip_code_fences(raw), "[{\"id\": \"1\"}]");
    }

    #[test]
    fn strips_unterminated_fence() {
        let raw = "```\n[{\"id\": \"1\"},";
        assert_eq!(strip_code_fences(raw), "[{\"id\": \"1\"},");
    }

    #[test]
    fn no_fence_is_identity() {
        assert_eq!(strip_code_fences("  [1, 2] "), "[1, 2]");
    }

    #[test]
    fn trims_to_outer_brackets() {
        assert_eq!(
            trim_to_outer_brackets("Antwort: [1, [2]] fertig", '[', ']'),
            "[1, [2]]"
        );
        assert_eq!(trim_to_outer_brackets("kein json", '[', ']'), "kein json");
    }

    #[test]
    fn removes_trailing_commas_outside_strings() {
        assert_eq!(
            remove_trailing_commas(r#"[{"a": "x,]", "b": 1,}, ]"#),
            r#"[{"a": "x,]", "b": 1} ]"#
        );
    }

    #[test]
    fn closes_truncated_array_after_last_complete_object() {
        let raw = r#"[{"id": "a"}, {"id": "b"}, {"id": "c", "text": "Wie vi"#;
        assert_eq!(close_truncated(raw), r#"[{"id": "a"}, {"id": "b"}]"#);
    }

    #[test]
    fn close_truncated_leaves_complete_documents_alone() {
        assert_eq!(close_truncated(r#"{"a": [1]} trailing"#), r#"{"a": [1]}"#);
    }

    #[test]
    fn salvages_individual_objects() {
        let raw = r#"[{"id": "a"}, {"id": broken}, {"id": "c",}"#;
        let objects = salvage_objects(raw);
        assert_eq!(objects, vec![json!({"id": "a"}), json!({"id": "c"})]);
    }

    #[test]
    fn parses_array_through_the_chain() {
        let raw = "```json\n[\n  {\"id\": \"q1\", \"text\": \"Fläche?\"},\n]\n```";
        let items = parse_json_array(raw).unwrap();
        assert_eq!(items, vec![json!({"id": "q1", "text": "Fläche?"})]);
    }

    #[test]
    fn accepts_object_wrapped_list() {
        let items = parse_json_array(r#"{"questions": [{"id": 1}]}"#).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn rejects_non_array_shapes() {
        assert_eq!(
            parse_json_array(r#"{"foo": "bar"}"#),
            Err(RepairError::NotAnArray("an object"))
        );
        assert_eq!(parse_json_array("nichts"), Err(RepairError::Unparseable));
    }

    #[test]
    fn parses_object_with_prose() {
        let map = parse_json_object("Gerne! {\"trades\": [], \"reasoning\": \"x\",} Ende").unwrap();
        assert!(map.contains_key("trades"));
    }

    #[test]
    fn parses_truncated_object() {
        let raw = r#"{"positions": [{"title": "A", "quantity": 1}, {"title": "B", "quan"#;
        let map = parse_json_object(raw).unwrap();
        assert_eq!(map["positions"].as_array().unwrap().len(), 1);
    }
}
