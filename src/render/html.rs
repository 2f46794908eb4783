//! Markup helpers shared by the section renderers.

use serde_json::Value;

/// Rendered in place of any missing or empty value.
pub const PLACEHOLDER: &str = "-";

/// Escape characters that are significant in HTML text and attribute values.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Plain-text form of a JSON value before escaping.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// True when the value should render as the placeholder.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Escaped display form of a data value; arrays are joined with `, `.
pub fn format_value(value: Option<&Value>) -> String {
    if is_blank(value) {
        return PLACEHOLDER.to_string();
    }
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| escape_html(&value_text(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => escape_html(&value_text(other)),
        None => PLACEHOLDER.to_string(),
    }
}

/// Escaped ` unit` suffix, only when both a value and a unit exist.
pub fn unit_suffix(value: Option<&Value>, unit: Option<&str>) -> String {
    match unit {
        Some(unit) if !unit.is_empty() && !is_blank(value) => format!(" {}", escape_html(unit)),
        _ => String::new(),
    }
}
