//! Performance oriented JSON manipulation.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// One step of a [`Path`] into the response data.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index in a list.
    Index(usize),

    /// A key in an object.
    Key(String),
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Index(index) => write!(f, "{index}"),
            PathElement::Key(key) => f.write_str(key),
        }
    }
}

/// A path into the result document.
///
/// Serialized as a JSON array of keys and indices, the way GraphQL error paths are.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    /// Returns a new path made of this one followed by `element`.
    pub fn join(&self, element: impl Into<PathElement>) -> Path {
        let mut elements = Vec::with_capacity(self.0.len() + 1);
        elements.extend(self.0.iter().cloned());
        elements.push(element.into());
        Path(elements)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in self.iter() {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path(
            s.split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| match segment.parse::<usize>() {
                    Ok(index) => PathElement::Index(index),
                    Err(_) => PathElement::Key(segment.to_string()),
                })
                .collect(),
        )
    }
}

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_string())
    }
}

impl From<String> for PathElement {
    fn from(key: String) -> Self {
        PathElement::Key(key)
    }
}

impl From<usize> for PathElement {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

/// Extension trait for [`Value`].
pub trait ValueExt {
    /// Returns the value at `path`, if every step of the path exists.
    fn get_path(&self, path: &Path) -> Option<&Value>;

    /// Returns a mutable reference to the value at `path`, if every step of the path exists.
    fn get_path_mut(&mut self, path: &Path) -> Option<&mut Value>;

    /// Returns `true` if the values are equal and the objects are ordered the same.
    ///
    /// **Note:** this is recursive.
    fn eq_and_ordered(&self, other: &Self) -> bool;
}

impl ValueExt for Value {
    fn get_path(&self, path: &Path) -> Option<&Value> {
        let mut current = self;
        for element in path.iter() {
            current = match (element, current) {
                (PathElement::Key(key), Value::Object(object)) => object.get(key.as_str())?,
                (PathElement::Index(index), Value::Array(array)) => array.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn get_path_mut(&mut self, path: &Path) -> Option<&mut Value> {
        let mut current = self;
        for element in path.iter() {
            current = match (element, current) {
                (PathElement::Key(key), Value::Object(object)) => object.get_mut(key.as_str())?,
                (PathElement::Index(index), Value::Array(array)) => array.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn eq_and_ordered(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.eq_and_ordered(vb))
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a.eq_and_ordered(b))
            }
            _ => self == other,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn path_display_and_parse() {
        let path = Path::from("/user/posts/0/title");
        assert_eq!(path.len(), 4);
        assert_eq!(path.0[2], PathElement::Index(0));
        assert_eq!(path.to_string(), "/user/posts/0/title");
    }

    #[test]
    fn path_serializes_as_array() {
        let path = Path::from("user/1/name");
        insta::assert_snapshot!(serde_json::to_string(&path).unwrap(), @r#"["user",1,"name"]"#);
    }

    #[test]
    fn get_path_mut_stops_at_null() {
        let mut value = json!({ "user": { "posts": [null, { "title": "B" }] } });
        assert!(value.get_path_mut(&Path::from("user/posts/0/title")).is_none());
        let slot = value.get_path_mut(&Path::from("user/posts/1/title")).unwrap();
        *slot = json!("C");
        assert_eq!(
            value.get_path(&Path::from("user/posts/1/title")),
            Some(&json!("C"))
        );
    }

    #[test]
    fn eq_and_ordered_checks_key_order() {
        let a = json!({ "a": 1, "b": { "c": 2, "d": 3 } });
        let b = json!({ "a": 1, "b": { "d": 3, "c": 2 } });
        assert_eq!(a, b);
        assert!(!a.eq_and_ordered(&b));
        assert!(a.eq_and_ordered(&a.clone()));
    }
}
