//! Serialized document state handed to persistence.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use quire_core::{Document, DocumentError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Title plus serialized content tree, as read from the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentContent {
    pub title: String,
    pub content: Value,
}

/// One save attempt's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub document_id: Uuid,
    pub title: String,
    pub content: Value,
    pub edited_by: Uuid,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(document_id: Uuid, edited_by: Uuid, content: DocumentContent) -> Self {
        Self {
            document_id,
            title: content.title,
            content: content.content,
            edited_by,
            taken_at: Utc::now(),
        }
    }
}

/// The editor side of a session.
///
/// `read_content` is the editor's serialized-content getter. `apply_loaded`
/// installs content fetched at open time without reporting it as a
/// mutation.
pub trait DocumentSource: Send + Sync {
    fn document_id(&self) -> Uuid;

    fn read_content(&self) -> DocumentContent;

    fn apply_loaded(&self, content: Value) -> Result<(), DocumentError>;
}

/// Editor document shared between the UI and its save session.
pub type SharedDocument = std::sync::Arc<RwLock<Document>>;

impl DocumentSource for RwLock<Document> {
    fn document_id(&self) -> Uuid {
        self.read().unwrap_or_else(|e| e.into_inner()).id
    }

    fn read_content(&self) -> DocumentContent {
        let doc = self.read().unwrap_or_else(|e| e.into_inner());
        DocumentContent {
            title: doc.title.clone(),
            content: doc.serialized_content(),
        }
    }

    fn apply_loaded(&self, content: Value) -> Result<(), DocumentError> {
        self.write()
            .unwrap_or_else(|e| e.into_inner())
            .apply_serialized(content)
    }
}
