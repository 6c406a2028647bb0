// ── Path resolution ──
//
// Firmware revisions add, drop, and rename fields freely. Every lookup into
// a snapshot goes through `resolve`, which turns any shape mismatch into
// `None` so consumers have a single "missing data" signal.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Map key.
    Key(String),
    /// Array index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Ordered key sequence locating one value inside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The empty path, which resolves to the whole snapshot.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from map keys only.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: keys.into_iter().map(|k| PathSegment::Key(k.into())).collect(),
        }
    }

    /// Append a map key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an array index.
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    /// This path followed by `tail`.
    pub fn join(&self, tail: &FieldPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(tail.segments.iter().cloned());
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromIterator<PathSegment> for FieldPath {
    fn from_iter<T: IntoIterator<Item = PathSegment>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Key(k) => f.write_str(k)?,
                PathSegment::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

/// A dotted path string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("empty segment at position {position}")]
    EmptySegment { position: usize },
    #[error("invalid index '{segment}'")]
    InvalidIndex { segment: String },
}

impl FromStr for FieldPath {
    type Err = PathParseError;

    /// Parse `devices.0.config.mode` or `poolSync.faults.[0]`.
    ///
    /// Bracketed segments are array indices; every other segment, including
    /// purely numeric ones like the device id `0`, is a map key. An empty
    /// string is the root path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::root());
        }

        s.split('.')
            .enumerate()
            .map(|(position, raw)| {
                if raw.is_empty() {
                    return Err(PathParseError::EmptySegment { position });
                }
                match raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                    Some(inner) => inner
                        .parse::<usize>()
                        .map(PathSegment::Index)
                        .map_err(|_| PathParseError::InvalidIndex {
                            segment: raw.to_owned(),
                        }),
                    None => Ok(PathSegment::Key(raw.to_owned())),
                }
            })
            .collect()
    }
}

/// Walk `path` from `root`.
///
/// Returns `None` as soon as a key is missing, an index is out of bounds,
/// a step meets the wrong container type, or a step lands on JSON `null`.
/// The empty path returns `root` itself.
pub fn resolve<'a>(root: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        if node.is_null() {
            return None;
        }
        node = match (segment, node) {
            (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    if node.is_null() { None } else { Some(node) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "poolSync": { "faults": [0, 3], "status": { "online": true } },
            "devices": { "0": { "config": { "mode": 1 }, "status": null } }
        })
    }

    #[test]
    fn resolves_nested_keys_and_indices() {
        let data = sample();
        let path: FieldPath = "poolSync.faults.[1]".parse().unwrap();
        assert_eq!(resolve(&data, &path), Some(&json!(3)));

        let mode = FieldPath::from_keys(["devices", "0", "config", "mode"]);
        assert_eq!(resolve(&data, &mode), Some(&json!(1)));
    }

    #[test]
    fn empty_path_returns_whole_snapshot() {
        let data = sample();
        assert_eq!(resolve(&data, &FieldPath::root()), Some(&data));
    }

    #[test]
    fn mismatches_are_absent() {
        let data = sample();
        for raw in [
            "missing",
            "poolSync.faults.[9]",
            "poolSync.faults.key",
            "poolSync.status.online.deeper",
            "devices.0.status.waterTemp",
            "devices.[0]",
        ] {
            let path: FieldPath = raw.parse().unwrap();
            assert_eq!(resolve(&data, &path), None, "path {raw}");
        }
    }

    #[test]
    fn empty_snapshot_never_panics() {
        let empty = json!({});
        assert_eq!(resolve(&empty, &FieldPath::from_keys(["a", "b"])), None);
        assert_eq!(resolve(&Value::Null, &FieldPath::root()), None);
    }

    #[test]
    fn numeric_segments_are_keys() {
        let path: FieldPath = "devices.0".parse().unwrap();
        assert_eq!(
            path.segments(),
            &[PathSegment::from("devices"), PathSegment::from("0")]
        );
        assert_eq!(path.to_string(), "devices.0");
    }

    #[test]
    fn rejects_malformed_dotted_paths() {
        assert!(matches!(
            "a..b".parse::<FieldPath>(),
            Err(PathParseError::EmptySegment { position: 1 })
        ));
        assert!(matches!(
            "a.[x]".parse::<FieldPath>(),
            Err(PathParseError::InvalidIndex { .. })
        ));
    }
}
