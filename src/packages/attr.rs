// src/packages/attr.rs

//! Attribute values exposed by packages for keyword filtering and grouping

use serde::Serialize;
use std::fmt;

/// A single package attribute value
///
/// Multi-valued attributes (keywords, homepages, USE flags) are `List`s.
/// `None` stands for a known attribute with no value, which is distinct from
/// an attribute the package does not have at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Borrow the string payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of a multi-valued attribute
    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::None => Ok(()),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<&String> for AttrValue {
    fn from(s: &String) -> Self {
        AttrValue::Str(s.clone())
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AttrValue::None, Into::into)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        AttrValue::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_lists() {
        let v = AttrValue::from(vec!["amd64", "~x86"]);
        assert_eq!(v.to_string(), "amd64 ~x86");
        assert_eq!(AttrValue::None.to_string(), "");
        assert_eq!(AttrValue::from(Some("x")), AttrValue::Str("x".to_string()));
        assert_eq!(AttrValue::from(None::<String>), AttrValue::None);
    }
}
