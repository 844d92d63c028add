//! Document model: metadata plus an ordered tree of blocks.
//!
//! The editor owns a [`Document`] and mutates it through [`Edit`]s.
//! Every edit is validated before it touches the tree, so a rejected
//! edit leaves the document exactly as it was.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::block::{Block, Inline};

/// Errors raised while editing or parsing a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("Block index {index} out of range (document has {len} blocks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Heading level {0} outside 1..=6")]
    InvalidHeadingLevel(u8),

    #[error("Block at index {0} does not hold text")]
    NotTextual(usize),

    #[error("Malformed content tree: {0}")]
    Malformed(String),
}

/// Fixed IEEE paper template or an unstructured document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    IeeeTemplate,
    #[default]
    FreeForm,
}

/// Ordered sequence of blocks, serialized as `{"type":"doc","content":[...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "DocNode", into = "DocNode")]
pub struct ContentTree {
    pub blocks: Vec<Block>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum DocNode {
    Doc {
        #[serde(default)]
        content: Vec<Block>,
    },
}

impl From<DocNode> for ContentTree {
    fn from(node: DocNode) -> Self {
        let DocNode::Doc { content } = node;
        Self { blocks: content }
    }
}

impl From<ContentTree> for DocNode {
    fn from(tree: ContentTree) -> Self {
        DocNode::Doc {
            content: tree.blocks,
        }
    }
}

impl ContentTree {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Reject trees the editor could never have produced.
    pub fn validate(&self) -> Result<(), DocumentError> {
        for block in &self.blocks {
            if let Block::Heading { level, .. } = block {
                check_heading_level(*level)?;
            }
        }
        Ok(())
    }
}

/// A single user-level edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    InsertBlock { index: usize, block: Block },
    RemoveBlock { index: usize },
    ReplaceBlock { index: usize, block: Block },
    AppendText { index: usize, text: String },
    SetTitle { title: String },
}

/// An open research document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub doc_type: DocumentType,
    pub owner_id: Uuid,
    pub content: ContentTree,
    /// Local edit counter, bumped by every applied edit.
    #[serde(default)]
    pub version: u64,
}

impl Document {
    pub fn new(owner_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            doc_type: DocumentType::FreeForm,
            owner_id,
            content: ContentTree::default(),
            version: 0,
        }
    }

    /// Create with explicit id (documents opened from the backend).
    pub fn with_id(id: Uuid, owner_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            ..Self::new(owner_id, title)
        }
    }

    /// Apply one edit. On error nothing is changed.
    pub fn apply(&mut self, edit: Edit) -> Result<(), DocumentError> {
        let len = self.content.len();
        match edit {
            Edit::InsertBlock { index, block } => {
                if index > len {
                    return Err(DocumentError::IndexOutOfRange { index, len });
                }
                validate_block(&block)?;
                self.content.blocks.insert(index, block);
            }
            Edit::RemoveBlock { index } => {
                if index >= len {
                    return Err(DocumentError::IndexOutOfRange { index, len });
                }
                self.content.blocks.remove(index);
            }
            Edit::ReplaceBlock { index, block } => {
                validate_block(&block)?;
                let slot = self
                    .content
                    .blocks
                    .get_mut(index)
                    .ok_or(DocumentError::IndexOutOfRange { index, len })?;
                *slot = block;
            }
            Edit::AppendText { index, text } => {
                let block = self
                    .content
                    .blocks
                    .get_mut(index)
                    .ok_or(DocumentError::IndexOutOfRange { index, len })?;
                let inlines = block
                    .inlines_mut()
                    .ok_or(DocumentError::NotTextual(index))?;
                inlines.push(Inline::text(text));
            }
            Edit::SetTitle { title } => {
                self.title = title;
            }
        }
        self.version += 1;
        Ok(())
    }

    /// Serialized content tree, as sent to the backend.
    pub fn serialized_content(&self) -> Value {
        // ContentTree holds only strings, integers and enums; serialization cannot fail.
        serde_json::to_value(&self.content).unwrap_or(Value::Null)
    }

    /// Replace the content tree with a serialized one (initial load).
    ///
    /// Does not bump `version`: loaded content is not a user edit.
    pub fn apply_serialized(&mut self, value: Value) -> Result<(), DocumentError> {
        let tree: ContentTree = serde_json::from_value(value)
            .map_err(|e| DocumentError::Malformed(e.to_string()))?;
        tree.validate()?;
        log::debug!(
            "Applied serialized content to {}: {} blocks",
            self.id,
            tree.len()
        );
        self.content = tree;
        Ok(())
    }

    pub fn plain_text(&self) -> String {
        self.content
            .blocks
            .iter()
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn word_count(&self) -> usize {
        self.plain_text().split_whitespace().count()
    }
}

fn check_heading_level(level: u8) -> Result<(), DocumentError> {
    if (1..=6).contains(&level) {
        Ok(())
    } else {
        Err(DocumentError::InvalidHeadingLevel(level))
    }
}

fn validate_block(block: &Block) -> Result<(), DocumentError> {
    match block {
        Block::Heading { level, .. } => check_heading_level(*level),
        _ => Ok(()),
    }
}
