//! IEEE conference paper skeleton.

use uuid::Uuid;

use crate::block::{Block, Inline, Mark, Span};
use crate::document::{ContentTree, Document, DocumentType};

/// Numbered body sections, in order.
pub const IEEE_SECTIONS: &[&str] = &[
    "I. Introduction",
    "II. Related Work",
    "III. Methodology",
    "IV. Results",
    "V. Conclusion",
];

const PLACEHOLDER_TITLE: &str = "Paper Title";

fn labelled(label: &str, body: &str) -> Block {
    Block::Paragraph {
        content: vec![
            Inline::Text(Span::marked(label, vec![Mark::Bold, Mark::Italic])),
            Inline::text(body),
        ],
    }
}

fn ieee_blocks() -> Vec<Block> {
    let mut blocks = vec![
        Block::heading(1, PLACEHOLDER_TITLE),
        Block::paragraph("Author Name, Affiliation, City, Country, email@example.com"),
        labelled(
            "Abstract\u{2014}",
            "This document is a template. Summarize the problem, approach and findings here.",
        ),
        labelled("Index Terms\u{2014}", "keyword one, keyword two, keyword three"),
    ];

    for section in IEEE_SECTIONS {
        blocks.push(Block::heading(2, *section));
        blocks.push(Block::paragraph(""));
    }

    blocks.push(Block::heading(2, "References"));
    blocks.push(Block::paragraph("[1] "));
    blocks
}

impl Document {
    /// New document pre-populated with the IEEE paper skeleton.
    pub fn ieee_template(owner_id: Uuid) -> Self {
        Self {
            doc_type: DocumentType::IeeeTemplate,
            content: ContentTree::new(ieee_blocks()),
            ..Document::new(owner_id, PLACEHOLDER_TITLE)
        }
    }
}
