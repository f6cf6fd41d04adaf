use serde_json::Value;

use crate::Fields;

/// Look up an output field by path.
///
/// The first segment names a field; further segments walk objects by key and
/// arrays by index. Both `statuses.0.url` and `statuses[0].url` are accepted.
pub fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
  let normalized = path.replace('[', ".").replace(']', "");
  let mut segments = normalized.split('.').filter(|s| !s.is_empty());

  let mut current = fields.get(segments.next()?)?;
  for segment in segments {
    current = match current {
      Value::Object(map) => map.get(segment)?,
      Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }
  Some(current)
}
