use serde_json::Value;

use crate::pkg::internal::ai::spec::ResumeProfile;

/// Turns a model reply into a `ResumeProfile`, tolerating the usual
/// decoration: markdown code fences around the object and prose before or
/// after it.
pub fn parse_profile(reply: &str) -> core::result::Result<ResumeProfile, String> {
    let stripped = strip_code_fences(reply);
    let value = match serde_json::from_str::<Value>(stripped) {
        Ok(value) => value,
        Err(first_err) => match first_json_object(stripped) {
            Some(span) => serde_json::from_str::<Value>(span).map_err(|e| e.to_string())?,
            None => return Err(first_err.to_string()),
        },
    };
    normalize(value)
}

fn normalize(mut value: Value) -> core::result::Result<ResumeProfile, String> {
    if let Some(fields) = value.as_object_mut() {
        // models occasionally hand back a string or null here
        let skills_is_array = fields.get("skills").map(Value::is_array).unwrap_or(false);
        if !skills_is_array {
            fields.insert("skills".into(), Value::Array(Vec::new()));
        }
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

// first balanced {...} span, skipping braces inside string literals
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
