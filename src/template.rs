//! Placeholder discovery and fill-state tracking for command templates.
//!
//! A command template is an arbitrary JSON value. Any string leaf containing
//! the `%` delimiter is a placeholder awaiting user input, regardless of
//! where the `%` sits in the string. Discovery walks the template depth-first
//! in document order, so the derived paths double as the presentation order
//! of the input controls.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Delimiter marking a string leaf as a placeholder.
pub const PLACEHOLDER_DELIMITER: char = '%';

// ── Variable paths ───────────────────────────────────────────────

/// One step into a JSON value: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

/// Ordered key sequence locating one placeholder leaf inside a template.
/// The empty path denotes the template root itself (a template that is a
/// bare placeholder string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VariablePath(Vec<PathSegment>);

impl VariablePath {
    /// The empty path: the template root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            keys.into_iter()
                .map(|k| PathSegment::Key(k.into()))
                .collect(),
        )
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// Parse a dotted path like `vars.target_id` or `items.0.name`.
    /// All-digit segments become array indices.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::root();
        }
        Self(
            text.split('.')
                .map(|part| {
                    part.parse::<usize>()
                        .map_or_else(|_| PathSegment::Key(part.to_string()), PathSegment::Index)
                })
                .collect(),
        )
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match segment {
                PathSegment::Key(k) => write!(f, "{k}")?,
                PathSegment::Index(n) => write!(f, "{n}")?,
            }
        }
        Ok(())
    }
}

// ── Placeholder discovery ────────────────────────────────────────

/// True iff `value` is a string leaf containing the delimiter. Multiple
/// `%` occurrences still make a single fillable leaf.
pub fn is_placeholder(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.contains(PLACEHOLDER_DELIMITER))
}

/// Derive all fillable variable paths of a template, depth-first pre-order,
/// parent before children, object keys in document order, array elements by
/// index. A template with zero placeholders yields an empty list; a bare
/// placeholder string yields exactly one entry, the root path.
pub fn derive_variable_paths(template: &Value) -> Vec<VariablePath> {
    let mut paths = Vec::new();
    walk(template, &VariablePath::root(), &mut paths);
    paths
}

fn walk(value: &Value, prefix: &VariablePath, out: &mut Vec<VariablePath>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, &prefix.child(PathSegment::Key(key.clone())), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(child, &prefix.child(PathSegment::Index(index)), out);
            }
        }
        _ => {
            if is_placeholder(value) {
                out.push(prefix.clone());
            }
        }
    }
}

// ── Path navigation ──────────────────────────────────────────────

/// Read the value at `path`, if the path exists.
pub fn value_at<'a>(root: &'a Value, path: &VariablePath) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = match segment {
            PathSegment::Key(k) => current.get(k)?,
            PathSegment::Index(i) => current.get(i)?,
        };
    }
    Some(current)
}

/// Overwrite the leaf at `path`, creating empty objects for any missing
/// intermediate segment. The empty path replaces the root wholesale.
/// Only ever mutates the filled copy, never the template.
pub fn set_value(root: &mut Value, path: &VariablePath, new_value: Value) {
    let Some((last, intermediate)) = path.segments().split_last() else {
        *root = new_value;
        return;
    };

    let mut current = root;
    for segment in intermediate {
        current = descend(current, segment);
    }
    match last {
        PathSegment::Key(k) => {
            if !current.is_object() {
                *current = Value::Object(serde_json::Map::new());
            }
            if let Some(map) = current.as_object_mut() {
                map.insert(k.clone(), new_value);
            }
        }
        PathSegment::Index(i) => {
            if let Some(items) = current.as_array_mut() {
                while items.len() <= *i {
                    items.push(Value::Null);
                }
                if let Some(slot) = items.get_mut(*i) {
                    *slot = new_value;
                }
            } else {
                // Paths derived from the template always hit a real array;
                // an index into anything else falls back to an object key.
                if !current.is_object() {
                    *current = Value::Object(serde_json::Map::new());
                }
                if let Some(map) = current.as_object_mut() {
                    map.insert(i.to_string(), new_value);
                }
            }
        }
    }
}

fn descend<'a>(current: &'a mut Value, segment: &PathSegment) -> &'a mut Value {
    match segment {
        PathSegment::Key(k) => {
            if !current.is_object() {
                *current = Value::Object(serde_json::Map::new());
            }
            match current {
                Value::Object(map) => map
                    .entry(k.clone())
                    .or_insert(Value::Object(serde_json::Map::new())),
                other => other,
            }
        }
        PathSegment::Index(i) => match current {
            Value::Array(items) => {
                while items.len() <= *i {
                    items.push(Value::Object(serde_json::Map::new()));
                }
                // In bounds: the loop above guarantees `items.len() > *i`.
                &mut items[*i]
            }
            other => {
                if !other.is_object() {
                    *other = Value::Object(serde_json::Map::new());
                }
                match other {
                    Value::Object(map) => map
                        .entry(i.to_string())
                        .or_insert(Value::Object(serde_json::Map::new())),
                    other => other,
                }
            }
        },
    }
}

// ── Fill session ─────────────────────────────────────────────────

/// A selected template plus its live filled working copy.
///
/// The template is immutable for the lifetime of the session; user input
/// mutates only the filled copy, and only at placeholder leaves, so the
/// shapes of the two values stay identical.
#[derive(Debug, Clone)]
pub struct FillSession {
    template: Value,
    filled: Value,
    paths: Vec<VariablePath>,
}

impl FillSession {
    /// Start a session from a template: deep-copies it into the working
    /// copy and derives the variable paths.
    pub fn new(template: &Value) -> Self {
        Self {
            template: template.clone(),
            filled: template.clone(),
            paths: derive_variable_paths(template),
        }
    }

    pub fn template(&self) -> &Value {
        &self.template
    }

    pub fn filled(&self) -> &Value {
        &self.filled
    }

    /// Variable paths in presentation order. One input control per entry.
    pub fn paths(&self) -> &[VariablePath] {
        &self.paths
    }

    pub fn has_placeholders(&self) -> bool {
        !self.paths.is_empty()
    }

    /// Overwrite the placeholder at `path` with a user-supplied string.
    pub fn set(&mut self, path: &VariablePath, text: &str) {
        set_value(&mut self.filled, path, Value::String(text.to_string()));
    }

    /// Current value at `path` if it already looks resolved (a string with
    /// no remaining delimiter). Supports re-editing a partially filled
    /// command without blanking out prior input.
    pub fn initial_value(&self, path: &VariablePath) -> Option<String> {
        match value_at(&self.filled, path) {
            Some(Value::String(s)) if !s.contains(PLACEHOLDER_DELIMITER) => Some(s.clone()),
            _ => None,
        }
    }

    /// Paths whose values are still missing: not a string, empty after
    /// trim, or still carrying the delimiter. The caller highlights these.
    pub fn unfilled(&self) -> Vec<VariablePath> {
        self.paths
            .iter()
            .filter(|path| match value_at(&self.filled, path) {
                Some(Value::String(s)) => {
                    s.trim().is_empty() || s.contains(PLACEHOLDER_DELIMITER)
                }
                _ => true,
            })
            .cloned()
            .collect()
    }

    /// True iff every variable has a non-empty, resolved value. Trivially
    /// true for a template with zero placeholders.
    pub fn all_filled(&self) -> bool {
        self.unfilled().is_empty()
    }
}
