use serde::Serialize;
use serde_json::Value;

/// Significant digits kept for floats in canonical JSON.
const FLOAT_SIG_DIGITS: i32 = 10;

/// Render any serialisable value as canonical JSON: UTF-8, object keys sorted, no
/// whitespace, floats rounded to 10 significant digits.
///
/// Hash inputs go through this function only; `serde_json`'s default map keeps keys
/// sorted, and the float rounding makes the byte stream independent of formatting
/// noise.
pub fn canonical<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    let mut out = String::new();
    write_value(&value, &mut out);
    Ok(out)
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                out.push_str(&int.to_string());
            } else if let Some(uint) = number.as_u64() {
                out.push_str(&uint.to_string());
            } else {
                out.push_str(&format_float(number.as_f64().unwrap_or(0.0)));
            }
        }
        Value::String(s) => {
            // serde_json escaping is deterministic
            out.push_str(&serde_json::to_string(s).expect("string serialises"));
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // serde_json::Map is BTreeMap-backed: iteration is key-sorted
            out.push('{');
            for (idx, (key, item)) in map.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).expect("string serialises"));
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

/// Round to [`FLOAT_SIG_DIGITS`] significant digits, rendered via the shortest
/// round-trip `Display` (never exponent notation).
fn format_float(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_finite() { "0.0".into() } else { "null".into() };
    }
    let magnitude = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(FLOAT_SIG_DIGITS - 1 - magnitude);
    let rounded = (value * factor).round() / factor;
    format!("{rounded:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_sorts_keys_and_strips_whitespace() {
        let value = json!({"zeta": 1, "alpha": {"b": 2, "a": 3}});
        assert_eq!(
            canonical(&value).unwrap(),
            r#"{"alpha":{"a":3,"b":2},"zeta":1}"#
        );
    }

    #[test]
    fn test_canonical_floats_are_rounded_to_significant_digits() {
        struct TestCase {
            input: f64,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: representable exactly
                input: 1.5,
                expected: "1.5",
            },
            TestCase {
                // TC1: more than 10 significant digits rounds
                input: 1.234567890123456,
                expected: "1.23456789",
            },
            TestCase {
                // TC2: zero
                input: 0.0,
                expected: "0.0",
            },
            TestCase {
                // TC3: small magnitudes keep 10 significant digits
                input: 0.000123456789012,
                expected: "0.000123456789",
            },
            TestCase {
                // TC4: negative
                input: -98.7654321098765,
                expected: "-98.76543211",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = canonical(&serde_json::json!(test.input)).unwrap();
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_canonical_is_reproducible() {
        let value = json!({"m": [1.0, 2.5, {"k": "v"}], "n": null});
        assert_eq!(canonical(&value).unwrap(), canonical(&value).unwrap());
    }
}
