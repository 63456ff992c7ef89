//! Request payloads for inputs (images) and their concepts.
//!
//! Images and concept annotations are accumulated into an [`InputBatch`] or a
//! [`ConceptBatch`]; `build()` takes an owned snapshot ([`InputsPayload`], [`InputsPatch`])
//! that is what actually goes on the wire. Accumulating further after a build never changes a
//! payload that was already built.

use std::fmt;

use base64::Engine;
use reqwest::Url;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::Result;

/// Documented per-request cap on inputs. Not enforced client-side; the API rejects larger
/// batches.
pub const MAX_BATCH_SIZE: usize = 128;

/// Where the pixels of an input come from.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A publicly reachable image URL.
    Url(String),
    /// Raw image bytes, sent base64-encoded.
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Treat `image` as a URL when it is UTF-8 text that parses as an absolute URL with a
    /// host, and as raw image bytes otherwise.
    pub fn classify(image: impl AsRef<[u8]>) -> Self {
        let raw = image.as_ref();
        if let Ok(text) = std::str::from_utf8(raw) {
            if Url::parse(text).is_ok_and(|url| url.has_host()) {
                return ImageSource::Url(text.to_string());
            }
        }
        ImageSource::Bytes(raw.to_vec())
    }

    pub fn is_url(&self) -> bool {
        matches!(self, ImageSource::Url(_))
    }

    fn base64(&self) -> Option<String> {
        match self {
            ImageSource::Bytes(bytes) => {
                Some(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ImageSource::Url(_) => None,
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
            ImageSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

impl From<&str> for ImageSource {
    fn from(value: &str) -> Self {
        Self::classify(value)
    }
}

impl From<String> for ImageSource {
    fn from(value: String) -> Self {
        Self::classify(value)
    }
}

impl From<&[u8]> for ImageSource {
    fn from(value: &[u8]) -> Self {
        Self::classify(value)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(value: Vec<u8>) -> Self {
        Self::classify(value)
    }
}

/// A concept annotation: `{"id": .., "name": .., "value": ..}` with absent fields omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<bool>,
}

impl Concept {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: bool) -> Self {
        self.value = Some(value);
        self
    }
}

impl From<&str> for Concept {
    fn from(id: &str) -> Self {
        Concept::new(id)
    }
}

impl From<(&str, bool)> for Concept {
    fn from((id, value): (&str, bool)) -> Self {
        Concept::new(id).with_value(value)
    }
}

impl From<(String, bool)> for Concept {
    fn from((id, value): (String, bool)) -> Self {
        Concept::new(id).with_value(value)
    }
}

/// One image plus its optional id, concepts, metadata and crop box.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageInput {
    pub id: Option<String>,
    pub source: ImageSource,
    pub concepts: Vec<Concept>,
    pub metadata: Option<Map<String, Value>>,
    /// `[top, left, bottom, right]` as fractions of the image size.
    pub crop: Option<Vec<f64>>,
}

impl ImageInput {
    pub fn new(image: impl Into<ImageSource>) -> Self {
        Self {
            id: None,
            source: image.into(),
            concepts: Vec::new(),
            metadata: None,
            crop: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_concept(mut self, concept: impl Into<Concept>) -> Self {
        self.concepts.push(concept.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_crop(mut self, crop: impl Into<Vec<f64>>) -> Self {
        self.crop = Some(crop.into());
        self
    }
}

impl From<ImageSource> for ImageInput {
    fn from(source: ImageSource) -> Self {
        ImageInput::new(source)
    }
}

impl From<&str> for ImageInput {
    fn from(image: &str) -> Self {
        ImageInput::new(image)
    }
}

impl From<String> for ImageInput {
    fn from(image: String) -> Self {
        ImageInput::new(image)
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(image: Vec<u8>) -> Self {
        ImageInput::new(image)
    }
}

#[derive(Serialize)]
struct WireInput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    data: WireInputData<'a>,
}

#[derive(Serialize)]
struct WireInputData<'a> {
    image: WireImage<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    concepts: Option<&'a [Concept]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Map<String, Value>>,
}

#[derive(Serialize)]
struct WireImage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crop: Option<&'a [f64]>,
}

impl Serialize for ImageInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let url = match &self.source {
            ImageSource::Url(url) => Some(url.as_str()),
            ImageSource::Bytes(_) => None,
        };
        WireInput {
            id: self.id.as_deref().filter(|id| !id.is_empty()),
            data: WireInputData {
                image: WireImage {
                    url,
                    base64: self.source.base64(),
                    crop: self.crop.as_deref().filter(|c| !c.is_empty()),
                },
                concepts: (!self.concepts.is_empty()).then_some(self.concepts.as_slice()),
                metadata: self.metadata.as_ref().filter(|m| !m.is_empty()),
            },
        }
        .serialize(serializer)
    }
}

/// Pending images, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct InputBatch {
    inputs: Vec<ImageInput>,
}

impl InputBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one image. Ids are not checked for uniqueness.
    pub fn add_image(&mut self, image: impl Into<ImageInput>) -> &mut Self {
        self.inputs.push(image.into());
        self
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageInput> {
        self.inputs.iter()
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }

    /// Snapshot the queued images into a request body.
    pub fn build(&self) -> InputsPayload {
        InputsPayload {
            inputs: self.inputs.clone(),
        }
    }

    /// The request body the queued images would produce, as JSON text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.build())?)
    }
}

/// `{"inputs": [...]}` body for `POST inputs` and `POST models/{id}/outputs`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InputsPayload {
    inputs: Vec<ImageInput>,
}

impl InputsPayload {
    pub fn inputs(&self) -> &[ImageInput] {
        &self.inputs
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl FromIterator<ImageInput> for InputsPayload {
    fn from_iter<I: IntoIterator<Item = ImageInput>>(iter: I) -> Self {
        Self {
            inputs: iter.into_iter().collect(),
        }
    }
}

/// How a concept patch is applied to existing concepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Merge,
    Remove,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Merge => f.write_str("merge"),
            Action::Remove => f.write_str("remove"),
        }
    }
}

/// Concepts to apply to one already-indexed input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConceptUpdate {
    pub input_id: String,
    pub concepts: Vec<Concept>,
}

impl Serialize for ConceptUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Data<'a> {
            concepts: &'a [Concept],
        }
        #[derive(Serialize)]
        struct Wire<'a> {
            id: &'a str,
            data: Data<'a>,
        }
        Wire {
            id: &self.input_id,
            data: Data {
                concepts: &self.concepts,
            },
        }
        .serialize(serializer)
    }
}

/// Pending concept updates, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct ConceptBatch {
    updates: Vec<ConceptUpdate>,
}

impl ConceptBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_concept<I, C>(&mut self, input_id: impl Into<String>, concepts: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Concept>,
    {
        self.updates.push(ConceptUpdate {
            input_id: input_id.into(),
            concepts: concepts.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn clear(&mut self) {
        self.updates.clear();
    }

    pub fn build(&self, action: Action) -> InputsPatch {
        InputsPatch {
            inputs: self.updates.clone(),
            action,
        }
    }
}

/// `{"inputs": [...], "action": "merge"|"remove"}` body for `PATCH inputs`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InputsPatch {
    inputs: Vec<ConceptUpdate>,
    action: Action,
}

impl InputsPatch {
    pub fn updates(&self) -> &[ConceptUpdate] {
        &self.inputs
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Target of an input deletion: one id (`DELETE inputs/{id}`) or a batch
/// (`DELETE inputs` with `{"ids": [...]}`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputIds {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for InputIds {
    fn from(id: &str) -> Self {
        InputIds::One(id.to_string())
    }
}

impl From<String> for InputIds {
    fn from(id: String) -> Self {
        InputIds::One(id)
    }
}

impl From<Vec<String>> for InputIds {
    fn from(ids: Vec<String>) -> Self {
        InputIds::Many(ids)
    }
}

impl From<&[&str]> for InputIds {
    fn from(ids: &[&str]) -> Self {
        InputIds::Many(ids.iter().map(|id| id.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for InputIds {
    fn from(ids: [&str; N]) -> Self {
        InputIds::Many(ids.iter().map(|id| id.to_string()).collect())
    }
}
