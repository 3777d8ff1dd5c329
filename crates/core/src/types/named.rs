//! Loosely-shaped references to named catalog entities.
//!
//! Depending on the serializer, the remote API renders a product's
//! `category` or `brand` as a bare string, as an object carrying a `name`,
//! or occasionally as a bare primary key. [`NamedRef`] accepts all three and
//! normalizes them to a display string.

use serde::{Deserialize, Serialize};

/// A reference to a named entity (category, brand, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamedRef {
    /// Plain string value.
    Name(String),
    /// Nested object with a `name` field; other fields are ignored.
    Object {
        /// Display name.
        name: String,
    },
    /// Bare primary key.
    Id(i64),
}

impl NamedRef {
    /// Normalized string form; `None` when the name is empty.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        let label = match self {
            Self::Name(name) | Self::Object { name } => name.clone(),
            Self::Id(id) => id.to_string(),
        };
        (!label.is_empty()).then_some(label)
    }
}

impl From<&str> for NamedRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}
