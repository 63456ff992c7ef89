//! Model references and model request bodies.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::inputs::{Action, Concept};

/// Models published by the service, addressable by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PublicModel {
    General,
    Adult,
    Weddings,
    Travel,
    Food,
    Color,
    Apparel,
    Celebrity,
    Face,
}

impl PublicModel {
    pub const ALL: [PublicModel; 9] = [
        PublicModel::General,
        PublicModel::Adult,
        PublicModel::Weddings,
        PublicModel::Travel,
        PublicModel::Food,
        PublicModel::Color,
        PublicModel::Apparel,
        PublicModel::Celebrity,
        PublicModel::Face,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PublicModel::General => "General",
            PublicModel::Adult => "Adult",
            PublicModel::Weddings => "Weddings",
            PublicModel::Travel => "Travel",
            PublicModel::Food => "Food",
            PublicModel::Color => "Color",
            PublicModel::Apparel => "Apparel",
            PublicModel::Celebrity => "Celebrity",
            PublicModel::Face => "Face",
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            PublicModel::General => "aaa03c23b3724a16a56b629203edc62c",
            PublicModel::Adult => "e9576d86d2004ed1a38ba0cf39ecb4b1",
            PublicModel::Weddings => "c386b7a870114f4a87477c0824499348",
            PublicModel::Travel => "eee28c313d69466f836ab83287a54ed9",
            PublicModel::Food => "bd367be194cf45149e75f01d59f77ba7",
            PublicModel::Color => "eeed0b6733a644cea07cf4c60f87ebb7",
            PublicModel::Apparel => "e0be3b9d6a454f0493ac3a30784001ff",
            PublicModel::Celebrity => "e466caa0619f444ab97497640cefc4dc",
            PublicModel::Face => "a403429f2ddf4b49b307e318f00e528b",
        }
    }

    /// Exact, case-sensitive name lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|model| model.name() == name)
    }
}

impl fmt::Display for PublicModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A model to run predictions against: a published model or a custom model id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelRef {
    Public(PublicModel),
    Custom(String),
}

impl ModelRef {
    /// Identifier used in request paths.
    pub fn id(&self) -> &str {
        match self {
            ModelRef::Public(model) => model.id(),
            ModelRef::Custom(id) => id,
        }
    }
}

impl Default for ModelRef {
    fn default() -> Self {
        ModelRef::Public(PublicModel::General)
    }
}

impl From<PublicModel> for ModelRef {
    fn from(model: PublicModel) -> Self {
        ModelRef::Public(model)
    }
}

/// Names in the public table resolve to that model; anything else is taken as a custom id.
impl From<&str> for ModelRef {
    fn from(value: &str) -> Self {
        PublicModel::from_name(value)
            .map(ModelRef::Public)
            .unwrap_or_else(|| ModelRef::Custom(value.to_string()))
    }
}

impl From<String> for ModelRef {
    fn from(value: String) -> Self {
        match PublicModel::from_name(&value) {
            Some(model) => ModelRef::Public(model),
            None => ModelRef::Custom(value),
        }
    }
}

impl FromStr for ModelRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ModelRef::from(s))
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRef::Public(model) => write!(f, "{model}"),
            ModelRef::Custom(id) => f.write_str(id),
        }
    }
}

/// `POST models` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelCreate {
    model: NewModel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct NewModel {
    name: String,
    id: String,
}

impl ModelCreate {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model: NewModel {
                name: name.into(),
                id: id.into(),
            },
        }
    }
}

/// `PATCH models` body: concepts merged into or removed from one model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelUpdate {
    models: Vec<ModelConcepts>,
    action: Action,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct ModelConcepts {
    id: String,
    output_info: OutputInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct OutputInfo {
    data: ConceptData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct ConceptData {
    concepts: Vec<Concept>,
}

impl ModelUpdate {
    pub fn new(id: impl Into<String>, concepts: Vec<Concept>, action: Action) -> Self {
        Self {
            models: vec![ModelConcepts {
                id: id.into(),
                output_info: OutputInfo {
                    data: ConceptData { concepts },
                },
            }],
            action,
        }
    }
}
