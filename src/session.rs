//! Stateful accumulate-then-send facade.
//!
//! [`ImageClient`] keeps the pending images, concept updates and page cursor for one caller
//! and hands snapshots of them to the stateless [`Client`]. It is meant to be owned by a
//! single logical session; share the underlying [`Client`] instead if several threads need
//! access.
//!
//! ```rust,ignore
//! use clarifai::{Config, ImageClient, ImageInput, SearchMode};
//!
//! let mut session = ImageClient::new(Config::new(client_id, client_secret))?;
//! session.add_image(ImageInput::new("https://samples.clarifai.com/metro-north.jpg").with_id("train"));
//! let prediction = session.predict("General")?;
//!
//! session.add_inputs()?;
//! session.set_pagination(1, 20)?;
//! let hits = session.search("train", SearchMode::Concept, true)?;
//! ```

use serde_json::Value;

use crate::{
    client::{Client, Config},
    errors::{Result, UsageError},
    inputs::{Action, Concept, ConceptBatch, ImageInput, InputBatch, InputIds},
    models::ModelRef,
    pagination::Pagination,
    search::{SearchMode, SearchTerm},
};

#[derive(Clone, Debug)]
pub struct ImageClient {
    client: Client,
    images: InputBatch,
    concepts: ConceptBatch,
    pagination: Option<Pagination>,
}

fn pagination_required() -> UsageError {
    UsageError::new("pagination must be initialized with set_pagination() first")
}

impl ImageClient {
    pub fn new(cfg: Config) -> Result<Self> {
        Ok(Self::from_client(Client::new(cfg)?))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            images: InputBatch::new(),
            concepts: ConceptBatch::new(),
            pagination: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // --- accumulation ---

    /// Queue an image for the next `predict` or `add_inputs`.
    pub fn add_image(&mut self, image: impl Into<ImageInput>) -> &mut Self {
        self.images.add_image(image);
        self
    }

    /// Queue concepts for input `input_id`, applied by the next `update_inputs`.
    pub fn add_concept<I, C>(&mut self, input_id: impl Into<String>, concepts: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Concept>,
    {
        self.concepts.add_concept(input_id, concepts);
        self
    }

    pub fn pending_images(&self) -> &InputBatch {
        &self.images
    }

    pub fn pending_concepts(&self) -> &ConceptBatch {
        &self.concepts
    }

    /// The body the queued images would be sent as.
    pub fn pending_images_json(&self) -> Result<String> {
        self.images.to_json()
    }

    pub fn clear_images(&mut self) {
        self.images.clear();
    }

    pub fn clear_concepts(&mut self) {
        self.concepts.clear();
    }

    // --- pagination ---

    pub fn set_pagination(&mut self, page: u32, count: u32) -> Result<()> {
        self.pagination = Some(Pagination::new(page, count)?);
        Ok(())
    }

    pub fn page_forward(&mut self, pages: u32) -> Result<()> {
        self.pagination
            .as_mut()
            .ok_or_else(pagination_required)?
            .forward(pages);
        Ok(())
    }

    /// Move back `pages` pages; stays on page 1 once there.
    pub fn page_back(&mut self, pages: u32) -> Result<()> {
        self.pagination
            .as_mut()
            .ok_or_else(pagination_required)?
            .back(pages);
        Ok(())
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn clear_pagination(&mut self) {
        self.pagination = None;
    }

    // --- models ---

    pub fn create_model(&self, name: &str, id: &str) -> Result<Value> {
        self.client.models().create(name, id)
    }

    pub fn update_model<I, C>(&self, id: &str, concepts: I, action: Action) -> Result<Value>
    where
        I: IntoIterator<Item = C>,
        C: Into<Concept>,
    {
        self.client.models().update(id, concepts, action)
    }

    /// One model when `id` is given, otherwise the (paginated) model list.
    pub fn list_models(&self, id: Option<&str>) -> Result<Value> {
        match id {
            Some(id) => self.client.models().get(id),
            None => self.client.models().list(self.pagination.as_ref()),
        }
    }

    pub fn train_model(&self, id: &str) -> Result<Value> {
        self.client.models().train(id)
    }

    /// Predict the queued images against `model` (a public model name or a custom id).
    pub fn predict(&self, model: impl Into<ModelRef>) -> Result<Value> {
        self.client.models().predict(model, &self.images.build())
    }

    // --- inputs ---

    pub fn add_inputs(&self) -> Result<Value> {
        self.client.inputs().add(&self.images.build())
    }

    pub fn update_inputs(&self, action: Action) -> Result<Value> {
        self.client.inputs().update(&self.concepts.build(action))
    }

    pub fn delete_inputs(&self, ids: impl Into<InputIds>) -> Result<Value> {
        self.client.inputs().delete(ids)
    }

    /// One input when `id` is given, otherwise the (paginated) input list.
    pub fn get_inputs(&self, id: Option<&str>) -> Result<Value> {
        match id {
            Some(id) => self.client.inputs().get(id),
            None => self.client.inputs().list(self.pagination.as_ref()),
        }
    }

    pub fn get_inputs_status(&self) -> Result<Value> {
        self.client.inputs().status()
    }

    // --- search ---

    pub fn search(
        &self,
        term: impl Into<SearchTerm>,
        mode: SearchMode,
        must_exist: bool,
    ) -> Result<Value> {
        self.client.searches().search(term, mode, must_exist)
    }

    pub fn search_by(
        &self,
        term: impl Into<SearchTerm>,
        mode: &str,
        must_exist: bool,
    ) -> Result<Value> {
        self.client.searches().search_by(term, mode, must_exist)
    }
}
