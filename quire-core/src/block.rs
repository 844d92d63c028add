//! Block-level nodes of the rich-text content tree.
//!
//! Serialized shape (JSON, one object per node, `type` tag first):
//! ```text
//! {"type":"doc","content":[
//!     {"type":"heading","level":1,"content":[{"type":"text","text":"Title"}]},
//!     {"type":"paragraph","content":[
//!         {"type":"text","text":"bold","marks":[{"type":"bold"}]},
//!         {"type":"hardBreak"}
//!     ]},
//!     {"type":"table","rows":[[[{"type":"text","text":"cell"}]]]},
//!     {"type":"image","src":"fig1.png","alt":"Figure 1"}
//! ]}
//! ```

use serde::{Deserialize, Serialize};

/// Inline formatting applied to a span of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Code,
    Link { href: String },
}

/// A run of text sharing one set of marks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }
}

/// Inline content of a paragraph, heading or table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
    Text(Span),
    HardBreak,
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text(Span::plain(text))
    }

    /// Plain-text rendering; a hard break becomes a newline.
    pub fn plain_text(&self) -> &str {
        match self {
            Inline::Text(span) => &span.text,
            Inline::HardBreak => "\n",
        }
    }
}

/// One table cell: a sequence of inline nodes.
pub type Cell = Vec<Inline>;

/// Top-level block node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Paragraph {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Inline>,
    },
    Heading {
        level: u8,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Inline>,
    },
    Table {
        rows: Vec<Vec<Cell>>,
    },
    Image {
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        let text = text.into();
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![Inline::text(text)]
        };
        Block::Paragraph { content }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level,
            content: vec![Inline::text(text)],
        }
    }

    pub fn image(src: impl Into<String>, caption: Option<String>) -> Self {
        Block::Image {
            src: src.into(),
            alt: None,
            caption,
        }
    }

    /// Inline content for text-bearing blocks, `None` for tables and images.
    pub fn inlines_mut(&mut self) -> Option<&mut Vec<Inline>> {
        match self {
            Block::Paragraph { content } | Block::Heading { content, .. } => Some(content),
            Block::Table { .. } | Block::Image { .. } => None,
        }
    }

    /// Concatenated text of the block. Table cells are tab-separated,
    /// rows newline-separated; an image contributes its caption.
    pub fn plain_text(&self) -> String {
        fn join(inlines: &[Inline]) -> String {
            inlines.iter().map(Inline::plain_text).collect()
        }

        match self {
            Block::Paragraph { content } | Block::Heading { content, .. } => join(content),
            Block::Table { rows } => rows
                .iter()
                .map(|row| row.iter().map(|cell| join(cell)).collect::<Vec<_>>().join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Image { caption, .. } => caption.clone().unwrap_or_default(),
        }
    }
}
