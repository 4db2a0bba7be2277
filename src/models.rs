//! Core data models used throughout docchat.
//!
//! Two families of types live here: the view model that flows into the
//! sidebar tree, selectors and transcript ([`Collection`], [`Document`],
//! [`Message`], [`Citation`]), and the wire types exchanged with the
//! backend HTTP API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named group of documents, shaped for the sidebar tree widget.
///
/// `label` is the capitalised display name, `value` the backend UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Document>>,
    #[serde(rename = "showCheckbox")]
    pub show_checkbox: bool,
}

impl Collection {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            children: None,
            show_checkbox: false,
        }
    }

    /// Documents attached to this collection, empty when none were populated.
    pub fn documents(&self) -> &[Document] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn find_document(&self, label: &str) -> Option<&Document> {
        self.documents().iter().find(|d| d.label == label)
    }
}

/// A leaf of the sidebar tree: one uploaded file inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub label: String,
    pub value: String,
    #[serde(rename = "showCheckbox")]
    pub show_checkbox: bool,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            value: name,
            show_checkbox: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A pointer to the page supporting an answer.
///
/// `page` is zero-based as returned by the backend; [`Citation::display_page`]
/// gives the one-based number shown to users and used in `#page=` anchors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub document: String,
    pub page: u32,
}

impl Citation {
    pub fn new(document: impl Into<String>, page: u32) -> Self {
        Self {
            document: document.into(),
            page,
        }
    }

    /// Saturates at `u32::MAX` for out-of-range backend pages.
    pub fn display_page(&self) -> u32 {
        self.page.saturating_add(1)
    }
}

// ============ Backend wire types ============

/// One page of `GET /collection/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionListPage {
    #[serde(default)]
    pub collections: Vec<CollectionEntry>,
    /// Missing `meta` leaves the page count unknown; paging stops after this page.
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionEntry {
    pub name: String,
    pub uuid: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageMeta {
    pub total_pages: u32,
}

/// Response of `GET /collection/{id}?with_documents=true`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionDetail {
    #[serde(default)]
    pub documents: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Collection,
    Document,
}

/// Generation parameters forwarded to the backend language model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub logit_bias: BTreeMap<String, i32>,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub mode: ChatMode,
    pub id_type: String,
    pub identifier: String,
    pub query: String,
    pub llm: LlmParams,
    pub include_citations: bool,
    pub include_usage: bool,
}
