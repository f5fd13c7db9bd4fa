use serde_json::Value;

/// Find the public link in a host response.
///
/// `fields` are dotted paths (`data.directLink`) tried in order; the first
/// one that resolves to a non-empty string wins.
pub fn extract_link<S: AsRef<str>>(response: &Value, fields: &[S]) -> Option<String> {
    fields.iter().find_map(|field| {
        let pointer = format!("/{}", field.as_ref().replace('.', "/"));
        response
            .pointer(&pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .map(str::to_string)
    })
}
