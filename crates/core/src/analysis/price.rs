use serde_json::Value;

const IGNORED_CHARS: &[char] = &['$', '€', '£', '¥', '₩', ',', ' ', '\u{a0}', '_'];

/// Normalize a price the model wrote as a number or as text like `"$1,234.50"`
/// or `"USD 120.00"`.
pub fn extract_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_price(s),
        _ => None,
    }
}

pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = strip_currency_code(text.trim())
        .chars()
        .filter(|c| !IGNORED_CHARS.contains(c))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Drop one leading or trailing three-letter code such as `USD` or `eur`.
/// A bare code, or letters running into more letters, is left alone.
fn strip_currency_code(text: &str) -> &str {
    let is_code = |code: Option<&str>| {
        code.is_some_and(|c| c.bytes().all(|b| b.is_ascii_alphabetic()))
    };

    if is_code(text.get(..3)) {
        let rest = &text[3..];
        if rest.starts_with(|c: char| !c.is_alphabetic()) {
            return rest.trim_start();
        }
    }
    if let Some(split) = text.len().checked_sub(3) {
        if is_code(text.get(split..)) {
            let rest = &text[..split];
            if rest.ends_with(|c: char| !c.is_alphabetic()) {
                return rest.trim_end();
            }
        }
    }
    text
}
