//! Tolerant accessors for loosely specified JSON payloads

use serde_json::Value;

/// Walk a dotted path such as `livestream.categories.0.name`
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(segment),
    })
}

/// First non-empty string found at any of the paths
pub fn first_str(value: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()).map(str::to_string))
}

/// First id found at any of the paths; ids arrive as numbers or strings
pub fn first_id(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().filter_map(|path| lookup(value, path)).find_map(|v| match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

/// First boolean found at any of the paths
pub fn first_bool(value: &Value, paths: &[&str]) -> Option<bool> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(Value::as_bool)
}
