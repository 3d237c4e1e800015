//! Read-time normalisation of legacy document keys.
//!
//! Older writers stored documents with PascalCase keys (`PersonalInfo`,
//! `CurrentPage`, `EVCharger`). Readers rewrite them to camelCase before
//! decoding. When both spellings of a key are present the camelCase one
//! wins.

use serde_json::{Map, Value};

/// Rewrite every object key in `value` to camelCase, recursively.
pub fn normalize_legacy_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let (canonical, legacy): (Vec<_>, Vec<_>) = map
                .into_iter()
                .partition(|(k, _)| camel_case_key(k) == *k);

            let mut out = Map::with_capacity(canonical.len() + legacy.len());
            for (key, v) in canonical {
                out.insert(key, normalize_legacy_keys(v));
            }
            for (key, v) in legacy {
                let key = camel_case_key(&key);
                if !out.contains_key(&key) {
                    out.insert(key, normalize_legacy_keys(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_legacy_keys).collect()),
        other => other,
    }
}

/// Lower-case the leading capital run of a key, keeping the start of the
/// next word: `PersonalInfo` → `personalInfo`, `EVCharger` → `evCharger`,
/// `ID` → `id`.
pub fn camel_case_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let upper_run = chars.iter().take_while(|c| c.is_ascii_uppercase()).count();

    let lower_until = match upper_run {
        0 => return key.to_string(),
        n if n == chars.len() => n,
        1 => 1,
        n if chars[n].is_ascii_lowercase() => n - 1,
        n => n,
    };

    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < lower_until { c.to_ascii_lowercase() } else { *c })
        .collect()
}
