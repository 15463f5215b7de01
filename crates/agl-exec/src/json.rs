use serde_json::Value;

use crate::ExecError;

/// Slice from the first `{` to the last `}` of `text`.
///
/// Analysis commands often wrap their JSON in prose or code fences; this
/// recovers the object without trying to understand the surrounding text.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extract and parse the JSON object embedded in `text`.
pub fn parse_json_output(text: &str) -> Result<Value, ExecError> {
    let raw = extract_json_object(text)
        .ok_or_else(|| ExecError::InvalidOutput("no JSON object in output".into()))?;
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ExecError::InvalidOutput(format!("malformed JSON: {}", e)))?;
    Ok(value)
}
