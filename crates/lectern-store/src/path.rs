//! Attribute paths and array selectors.
//!
//! Grammar: `name`, `a.b`, `body[2]`, `body[-1]`, `body[_key=="k1"].text`.
//! Negative indices count from the end of the array.

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(i64),
    KeyMatch(String),
}

/// A parsed attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(path: &str) -> StoreResult<Self> {
        let invalid = || StoreError::Rejected(format!("invalid attribute path: {path:?}"));

        let mut segments = Vec::new();
        let mut rest = path;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']').ok_or_else(invalid)?;
                segments.push(parse_bracket(&after[..end]).ok_or_else(invalid)?);
                rest = &after[end + 1..];
                continue;
            }
            let body = match rest.strip_prefix('.') {
                Some(body) if !segments.is_empty() => body,
                Some(_) => return Err(invalid()),
                None => rest,
            };
            let end = body.find(|c: char| c == '.' || c == '[').unwrap_or(body.len());
            if end == 0 {
                return Err(invalid());
            }
            segments.push(Segment::Key(body[..end].to_string()));
            rest = &body[end..];
        }

        if segments.is_empty() {
            return Err(invalid());
        }
        Ok(Self { segments })
    }

    /// Path to the `index`-th element of the array at `field`.
    pub fn element(field: &str, index: i64) -> String {
        format!("{field}[{index}]")
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Split into the parent path and the final segment.
    pub fn split_last(&self) -> Option<(Option<FieldPath>, &Segment)> {
        let (last, parent) = self.segments.split_last()?;
        let parent = if parent.is_empty() {
            None
        } else {
            Some(FieldPath {
                segments: parent.to_vec(),
            })
        };
        Some((parent, last))
    }

    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, seg| step(node, seg))
    }

    pub fn get_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        let mut node = root;
        for seg in &self.segments {
            node = step_mut(node, seg)?;
        }
        Some(node)
    }

    /// Write `value` at this path, creating intermediate objects for
    /// missing keys. Array selectors must already resolve.
    pub fn set(&self, root: &mut Value, value: Value) -> StoreResult<()> {
        let unresolved = || StoreError::Rejected(format!("cannot resolve path {self}"));
        let (parent, last) = self.split_last().ok_or_else(unresolved)?;
        let mut node = root;
        if let Some(parent) = &parent {
            for seg in parent.segments() {
                node = match seg {
                    Segment::Key(key) => {
                        let obj = node.as_object_mut().ok_or_else(unresolved)?;
                        obj.entry(key.clone())
                            .or_insert_with(|| Value::Object(Map::new()))
                    }
                    other => step_mut(node, other).ok_or_else(unresolved)?,
                };
            }
        }
        match last {
            Segment::Key(key) => {
                let obj = node.as_object_mut().ok_or_else(unresolved)?;
                obj.insert(key.clone(), value);
            }
            other => {
                let slot = step_mut(node, other).ok_or_else(unresolved)?;
                *slot = value;
            }
        }
        Ok(())
    }

    /// Remove the value at this path; a missing path is a no-op.
    pub fn remove(&self, root: &mut Value) -> Option<Value> {
        let (parent, last) = self.split_last()?;
        let node = match &parent {
            Some(parent) => parent.get_mut(root)?,
            None => root,
        };
        match (last, node) {
            (Segment::Key(key), Value::Object(obj)) => obj.remove(key),
            (Segment::Index(i), Value::Array(arr)) => {
                let idx = resolve_index(*i, arr.len())?;
                Some(arr.remove(idx))
            }
            (Segment::KeyMatch(k), Value::Array(arr)) => {
                let idx = position_by_key(arr, k)?;
                Some(arr.remove(idx))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Key(key) if i == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
                Segment::KeyMatch(k) => write!(f, "[_key==\"{k}\"]")?,
            }
        }
        Ok(())
    }
}

/// Resolve a possibly negative index against an array length.
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let idx = if index < 0 { len + index } else { index };
    (0..len).contains(&idx).then_some(idx as usize)
}

/// Index of the element whose `_key` equals `key`.
pub fn position_by_key(items: &[Value], key: &str) -> Option<usize> {
    items
        .iter()
        .position(|item| item.get("_key").and_then(Value::as_str) == Some(key))
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if let Ok(idx) = inner.trim().parse::<i64>() {
        return Some(Segment::Index(idx));
    }
    let key = inner.trim().strip_prefix("_key")?.trim_start();
    let key = key.strip_prefix("==")?.trim();
    let key = key
        .strip_prefix('"')
        .and_then(|k| k.strip_suffix('"'))
        .or_else(|| key.strip_prefix('\'').and_then(|k| k.strip_suffix('\'')))?;
    Some(Segment::KeyMatch(key.to_string()))
}

fn step<'a>(node: &'a Value, seg: &Segment) -> Option<&'a Value> {
    match (seg, node) {
        (Segment::Key(key), Value::Object(obj)) => obj.get(key),
        (Segment::Index(i), Value::Array(arr)) => arr.get(resolve_index(*i, arr.len())?),
        (Segment::KeyMatch(k), Value::Array(arr)) => arr.get(position_by_key(arr, k)?),
        _ => None,
    }
}

fn step_mut<'a>(node: &'a mut Value, seg: &Segment) -> Option<&'a mut Value> {
    match (seg, node) {
        (Segment::Key(key), Value::Object(obj)) => obj.get_mut(key),
        (Segment::Index(i), Value::Array(arr)) => {
            let idx = resolve_index(*i, arr.len())?;
            arr.get_mut(idx)
        }
        (Segment::KeyMatch(k), Value::Array(arr)) => {
            let idx = position_by_key(arr, k)?;
            arr.get_mut(idx)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mixed_segments() {
        let path = FieldPath::parse("body[_key==\"k1\"].children[-1].text").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("body".to_string()),
                Segment::KeyMatch("k1".to_string()),
                Segment::Key("children".to_string()),
                Segment::Index(-1),
                Segment::Key("text".to_string()),
            ]
        );
        assert_eq!(path.to_string(), "body[_key==\"k1\"].children[-1].text");
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", ".a", "a..b", "a[", "a[foo]"] {
            assert!(FieldPath::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = json!({"title": "x"});
        FieldPath::parse("meta.author.name")
            .unwrap()
            .set(&mut doc, json!("Ada"))
            .unwrap();
        assert_eq!(doc["meta"]["author"]["name"], "Ada");
    }

    #[test]
    fn negative_index_reads_from_end() {
        let doc = json!({"tags": ["a", "b", "c"]});
        let path = FieldPath::parse("tags[-1]").unwrap();
        assert_eq!(path.get(&doc), Some(&json!("c")));
    }

    #[test]
    fn remove_by_key_match() {
        let mut doc = json!({"body": [{"_key": "a"}, {"_key": "b"}]});
        let removed = FieldPath::parse("body[_key==\"a\"]")
            .unwrap()
            .remove(&mut doc);
        assert_eq!(removed, Some(json!({"_key": "a"})));
        assert_eq!(doc["body"], json!([{"_key": "b"}]));
    }

    #[test]
    fn resolve_index_bounds() {
        assert_eq!(resolve_index(0, 0), None);
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(-4, 3), None);
    }
}
