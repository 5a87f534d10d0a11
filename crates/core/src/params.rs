//! Lenient typed lookups on a `serde_json::Value` parameter object.
//!
//! Missing keys and wrong types fall back to the supplied default, so a
//! partial `--params` override never fails.

use serde_json::Value;

/// Extracts an `f64` (integers accepted) from `params[name]`.
pub fn param_f64(params: &Value, name: &str, default: f64) -> f64 {
    params.get(name).and_then(Value::as_f64).unwrap_or(default)
}

/// Extracts a non-negative integer from `params[name]` as `usize`.
pub fn param_usize(params: &Value, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}

/// Extracts a `String` from `params[name]`.
pub fn param_string(params: &Value, name: &str, default: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn param_f64_reads_float_and_integer() {
        let params = json!({"margin": 120.5, "area_size": 512});
        assert_eq!(param_f64(&params, "margin", 150.0), 120.5);
        assert_eq!(param_f64(&params, "area_size", 720.0), 512.0);
    }

    #[test]
    fn param_f64_falls_back_on_missing_or_wrong_type() {
        let params = json!({"margin": "wide"});
        assert_eq!(param_f64(&params, "margin", 150.0), 150.0);
        assert_eq!(param_f64(&params, "bleed", 1.0), 1.0);
        assert_eq!(param_f64(&json!(null), "bleed", 2.0), 2.0);
    }

    #[test]
    fn param_usize_rejects_negative_and_fractional() {
        let params = json!({"cols": -4, "rows": 2.5, "ok": 9});
        assert_eq!(param_usize(&params, "cols", 16), 16);
        assert_eq!(param_usize(&params, "rows", 12), 12);
        assert_eq!(param_usize(&params, "ok", 0), 9);
    }

    #[test]
    fn param_string_reads_or_defaults() {
        let params = json!({"background": "#101010", "other": 3});
        assert_eq!(param_string(&params, "background", "#59592d"), "#101010");
        assert_eq!(param_string(&params, "other", "x"), "x");
        assert_eq!(param_string(&params, "missing", "y"), "y");
    }
}
