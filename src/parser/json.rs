use crate::error::ParseError;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Parse a stage response out of reasoner output.
///
/// Accepts bare JSON, JSON in a fenced block, JSON embedded in prose, and any
/// of those wrapped in the Claude CLI `{"result": "..."}` envelope.
pub fn parse_response<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    // Claude wraps result in {"result": "...", ...} JSON
    #[derive(Deserialize)]
    struct ClaudeOutput {
        result: String,
    }

    let text = match serde_json::from_str::<ClaudeOutput>(raw.trim()) {
        Ok(claude_out) => claude_out.result,
        Err(_) => raw.to_string(),
    };

    let json_str = extract_json(&text).ok_or(ParseError::NoJson)?;
    Ok(serde_json::from_str(&json_str)?)
}

/// Extract JSON object from a string that might contain markdown code blocks
fn extract_json(s: &str) -> Option<String> {
    // First try: the whole string is valid JSON
    if s.trim().starts_with('{')
        && serde_json::from_str::<serde_json::Value>(s.trim()).is_ok()
    {
        return Some(s.trim().to_string());
    }

    // Second try: extract from markdown code block
    let re = regex::Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").ok()?;
    for cap in re.captures_iter(s) {
        let Some(block) = cap.get(1) else { continue };
        let potential_json = block.as_str().trim();
        if potential_json.starts_with('{')
            && serde_json::from_str::<serde_json::Value>(potential_json).is_ok()
        {
            return Some(potential_json.to_string());
        }
    }

    // Third try: first balanced object in the prose
    let brace_start = s.find('{')?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = brace_start;

    for (i, c) in s[brace_start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = brace_start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > brace_start {
        let potential_json = &s[brace_start..end];
        if serde_json::from_str::<serde_json::Value>(potential_json).is_ok() {
            return Some(potential_json.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Zoning {
        district: String,
    }

    #[test]
    fn test_parse_direct_json() {
        let parsed: Zoning = parse_response(r#"{"district": "RS-10"}"#).unwrap();
        assert_eq!(parsed.district, "RS-10");
    }

    #[test]
    fn test_parse_claude_wrapped() {
        let raw = r#"{"type": "result", "result": "Here you go:\n```json\n{\"district\": \"RS-10\"}\n```", "session_id": "abc"}"#;
        let parsed: Zoning = parse_response(raw).unwrap();
        assert_eq!(parsed.district, "RS-10");
    }

    #[test]
    fn test_parse_markdown_wrapped() {
        let md = r#"
The parcel is zoned residential.

```json
{"district": "RS-10"}
```
"#;
        let parsed: Zoning = parse_response(md).unwrap();
        assert_eq!(parsed.district, "RS-10");
    }

    #[test]
    fn test_parse_embedded_in_prose_with_braces_in_strings() {
        let raw = r#"Result: {"district": "RS-10 {legacy}"} hope that helps"#;
        let parsed: Zoning = parse_response(raw).unwrap();
        assert_eq!(parsed.district, "RS-10 {legacy}");
    }

    #[test]
    fn test_no_json() {
        let err = parse_response::<Zoning>("I could not find that parcel.").unwrap_err();
        assert!(matches!(err, ParseError::NoJson));
    }

    #[test]
    fn test_wrong_shape() {
        let err = parse_response::<Zoning>(r#"{"zone": "RS-10"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }
}
