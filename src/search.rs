//! Search request bodies.
//!
//! Every search is a single clause inside `{"query": {"ands": [...]}}`. The mode decides
//! which side of the index the clause constrains (`input`: what was indexed, `output`: what
//! the model predicts), which data field holds the criterion, and how the term is shaped.

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::errors::ValidationError;

/// Which side of the index a search clause constrains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// What a search term is matched against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Concepts predicted by the model.
    #[default]
    Concept,
    /// Concepts the caller attached when indexing.
    UserConcept,
    /// A `[key, value]` pair in the input metadata.
    Meta,
    /// The URL an input was indexed from.
    Url,
    /// Visual similarity to the image at a URL.
    Image,
}

impl SearchMode {
    pub const ALL: [SearchMode; 5] = [
        SearchMode::Concept,
        SearchMode::UserConcept,
        SearchMode::Meta,
        SearchMode::Url,
        SearchMode::Image,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Concept => "concept",
            SearchMode::UserConcept => "user_concept",
            SearchMode::Meta => "meta",
            SearchMode::Url => "url",
            SearchMode::Image => "image",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            SearchMode::Concept | SearchMode::Image => Direction::Output,
            SearchMode::UserConcept | SearchMode::Meta | SearchMode::Url => Direction::Input,
        }
    }

    /// Field under `data` that carries the criterion.
    pub fn result_field(self) -> &'static str {
        match self {
            SearchMode::Concept | SearchMode::UserConcept => "concepts",
            SearchMode::Meta => "metadata",
            SearchMode::Url | SearchMode::Image => "image",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new(format!("invalid search mode {s:?}")).with_field("mode")
            })
    }
}

/// A search term: plain text for every mode except [`SearchMode::Meta`], which takes a
/// key/value pair.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchTerm {
    Text(String),
    KeyValue(String, Value),
}

impl From<&str> for SearchTerm {
    fn from(value: &str) -> Self {
        SearchTerm::Text(value.to_string())
    }
}

impl From<String> for SearchTerm {
    fn from(value: String) -> Self {
        SearchTerm::Text(value)
    }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for SearchTerm {
    fn from((key, value): (K, V)) -> Self {
        SearchTerm::KeyValue(key.into(), value.into())
    }
}

impl From<[&str; 2]> for SearchTerm {
    fn from([key, value]: [&str; 2]) -> Self {
        SearchTerm::KeyValue(key.to_string(), Value::String(value.to_string()))
    }
}

impl TryFrom<Value> for SearchTerm {
    type Error = ValidationError;

    /// Accepts a JSON string, or a two-element array whose first element is a string key.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(SearchTerm::Text(text)),
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(Value::String(key)), Some(value)) => {
                        Ok(SearchTerm::KeyValue(key, value))
                    }
                    _ => Err(pair_required()),
                }
            }
            Value::Array(_) => Err(pair_required()),
            _ => Err(text_required()),
        }
    }
}

fn pair_required() -> ValidationError {
    ValidationError::new(
        "metadata search requires the term to be a [key, value] pair with a string key",
    )
    .with_field("term")
}

fn text_required() -> ValidationError {
    ValidationError::new("search term should be a string").with_field("term")
}

/// A fully-shaped search body, built fresh for each search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchQuery {
    mode: SearchMode,
    body: Value,
}

impl SearchQuery {
    pub fn build(
        term: &SearchTerm,
        mode: SearchMode,
        must_exist: bool,
    ) -> Result<Self, ValidationError> {
        let content = match (mode, term) {
            (SearchMode::Concept | SearchMode::UserConcept, SearchTerm::Text(name)) => {
                json!([{ "name": name, "value": must_exist }])
            }
            (SearchMode::Meta, SearchTerm::KeyValue(key, value)) => {
                let mut map = Map::new();
                map.insert(key.clone(), value.clone());
                Value::Object(map)
            }
            (SearchMode::Url | SearchMode::Image, SearchTerm::Text(url)) => json!({ "url": url }),
            (SearchMode::Meta, SearchTerm::Text(_)) => return Err(pair_required()),
            (_, SearchTerm::KeyValue(..)) => return Err(text_required()),
        };

        let data = json!({ "data": { mode.result_field(): content } });
        let clause = match mode {
            // Reverse-image search nests the output criterion one level deeper.
            SearchMode::Image => json!({ "output": { "input": data } }),
            _ => json!({ mode.direction().as_str(): data }),
        };

        Ok(Self {
            mode,
            body: json!({ "query": { "ands": [clause] } }),
        })
    }

    /// Parse the mode by name first; unknown names fail before any term checks.
    pub fn build_by_name(
        term: &SearchTerm,
        mode: &str,
        must_exist: bool,
    ) -> Result<Self, ValidationError> {
        Self::build(term, mode.parse()?, must_exist)
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn as_json(&self) -> &Value {
        &self.body
    }

    pub fn into_json(self) -> Value {
        self.body
    }
}

impl Serialize for SearchQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}
