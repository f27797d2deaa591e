//! Typed values held by the settings trees.
//!
//! Values written by builds or plug-ins whose concrete type is not compiled in
//! survive a load/save cycle through the [`SettingValue::Opaque`] variant; the
//! text payload is carried verbatim and never interpreted.

use std::path::{Path, PathBuf};

/// Outcome of comparing two setting values.
///
/// `Incomparable` means at least one side holds a payload without meaningful
/// comparison; callers decide whether that counts as a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueComparison {
    Equal,
    Different,
    Incomparable,
}

/// A single typed value stored in a settings tree.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Path(PathBuf),
    TextList(Vec<String>),
    /// Payload of a type this build does not understand, kept verbatim.
    ///
    /// Only the element's own text body is carried. Child elements under an
    /// unrecognized type are dropped on load, so foreign values with nested
    /// markup come back as their text content alone.
    Opaque { type_name: String, body: String },
}

impl SettingValue {
    /// Compare two values without assuming every payload supports it.
    ///
    /// `Opaque` payloads have no canonical form, so any comparison touching
    /// one reports [`ValueComparison::Incomparable`] rather than guessing.
    pub fn compare(&self, other: &SettingValue) -> ValueComparison {
        use SettingValue::*;
        let equal = match (self, other) {
            (Opaque { .. }, _) | (_, Opaque { .. }) => return ValueComparison::Incomparable,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Path(a), Path(b)) => a == b,
            (TextList(a), TextList(b)) => a == b,
            _ => false,
        };
        if equal {
            ValueComparison::Equal
        } else {
            ValueComparison::Different
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            SettingValue::Path(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::TextList(items) => Some(items),
            _ => None,
        }
    }

    /// Type tag written to the `type` attribute of a serialized value.
    pub fn type_name(&self) -> &str {
        match self {
            SettingValue::Bool(_) => "bool",
            SettingValue::Int(_) => "int",
            SettingValue::Float(_) => "float",
            SettingValue::Text(_) => "text",
            SettingValue::Path(_) => "path",
            SettingValue::TextList(_) => "textList",
            SettingValue::Opaque { type_name, .. } => type_name,
        }
    }

    /// Element body for serialization; lists serialize as child items instead.
    pub(crate) fn body_text(&self) -> String {
        match self {
            SettingValue::Bool(value) => value.to_string(),
            SettingValue::Int(value) => value.to_string(),
            SettingValue::Float(value) => value.to_string(),
            SettingValue::Text(value) => value.clone(),
            SettingValue::Path(value) => value.to_string_lossy().into_owned(),
            SettingValue::TextList(_) => String::new(),
            SettingValue::Opaque { body, .. } => body.clone(),
        }
    }

    pub(crate) fn list_items(&self) -> Option<&[String]> {
        match self {
            SettingValue::TextList(items) => Some(items),
            _ => None,
        }
    }

    /// Rebuild a value from its serialized parts.
    ///
    /// Unknown type tags become `Opaque` so foreign payloads round-trip; a
    /// body that does not parse for its declared type yields `None`.
    pub(crate) fn from_document(type_name: &str, body: &str, items: Vec<String>) -> Option<Self> {
        match type_name {
            "bool" => body.trim().parse().ok().map(SettingValue::Bool),
            "int" => body.trim().parse().ok().map(SettingValue::Int),
            "float" => body.trim().parse().ok().map(SettingValue::Float),
            "text" => Some(SettingValue::Text(body.to_string())),
            "path" => Some(SettingValue::Path(PathBuf::from(body))),
            "textList" => Some(SettingValue::TextList(items)),
            other => Some(SettingValue::Opaque {
                type_name: other.to_string(),
                body: body.to_string(),
            }),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(value.into())
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<PathBuf> for SettingValue {
    fn from(value: PathBuf) -> Self {
        SettingValue::Path(value)
    }
}

impl From<&Path> for SettingValue {
    fn from(value: &Path) -> Self {
        SettingValue::Path(value.to_path_buf())
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(items: Vec<String>) -> Self {
        SettingValue::TextList(items)
    }
}
