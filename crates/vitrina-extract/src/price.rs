use std::str::FromStr;

use serde_json::Value;
use vitrina_crawler::Decimal;

/// Reads a displayed price such as `"COP $ 1.234.567,89"` or `"$12,900"`.
///
/// When both separators appear the last one is the decimal mark. A separator
/// repeated several times, or followed by exactly three digits, groups thousands.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let clean: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if !clean.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let commas = clean.matches(',').count();
    let dots = clean.matches('.').count();
    let normalized = match (commas, dots) {
        (0, 0) => clean,
        (_, 0) if commas > 1 || groups_thousands(&clean, ',') => clean.replace(',', ""),
        (_, 0) => clean.replace(',', "."),
        (0, _) if dots > 1 || groups_thousands(&clean, '.') => clean.replace('.', ""),
        (0, _) => clean,
        _ => {
            let last_comma = clean.rfind(',').unwrap_or_default();
            let last_dot = clean.rfind('.').unwrap_or_default();
            if last_comma > last_dot {
                clean.replace('.', "").replace(',', ".")
            } else {
                clean.replace(',', "")
            }
        }
    };

    Decimal::from_str(normalized.trim_matches('.')).ok()
}

/// A lone separator followed by exactly three digits, as in `12.900`.
fn groups_thousands(clean: &str, separator: char) -> bool {
    match clean.split_once(separator) {
        Some((int, frac)) => !int.is_empty() && frac.len() == 3,
        None => false,
    }
}

/// Price found in a JSON document, either as a number or as displayed text.
pub fn json_price(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .ok()
        }
        Value::String(s) => parse_price(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn colombian_format() {
        assert_eq!(parse_price("COP $ 1.234.567,89"), Some(dec("1234567.89")));
        assert_eq!(parse_price("$\u{a0}12.900"), Some(dec("12900")));
        assert_eq!(parse_price("$ 8.500,00"), Some(dec("8500.00")));
    }

    #[test]
    fn english_format() {
        assert_eq!(parse_price("$1,234,567.89"), Some(dec("1234567.89")));
        assert_eq!(parse_price("19.90"), Some(dec("19.90")));
        assert_eq!(parse_price("19,90"), Some(dec("19.90")));
        assert_eq!(parse_price("$1,234"), Some(dec("1234")));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("Agotado"), None);
        assert_eq!(parse_price(",."), None);
    }

    #[test]
    fn json_numbers_and_strings() {
        assert_eq!(json_price(&json!(12900)), Some(dec("12900")));
        assert_eq!(json_price(&json!(19.9)), Some(dec("19.9")));
        assert_eq!(json_price(&json!("$ 3.200")), Some(dec("3200")));
        assert_eq!(json_price(&json!(null)), None);
    }
}
