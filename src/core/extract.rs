use serde_json::Value;

/// Best-effort decoding of a JSON payload from free-form generator text.
///
/// The whole text is tried first. Otherwise the first `{` or `[` is paired with
/// the last matching closer in the string and only that slice is parsed.
/// Absence is an expected outcome, so this never fails.
pub fn extract(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let slice = embedded_payload(trimmed)?;
    match serde_json::from_str::<Value>(slice) {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Embedded payload did not parse: {e}");
            None
        }
    }
}

fn embedded_payload(text: &str) -> Option<&str> {
    for (start, open) in text.char_indices() {
        let close = match open {
            '{' => '}',
            '[' => ']',
            _ => continue,
        };
        if let Some(end) = text.rfind(close)
            && end > start
        {
            return Some(&text[start..=end]);
        }
    }
    None
}
