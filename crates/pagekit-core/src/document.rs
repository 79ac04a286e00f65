//! Loading source documents and holding serialized results

use lopdf::{Document, ObjectId};
use serde::Serialize;

use crate::error::{PageKitError, Result};

/// An uploaded PDF, parsed once and never mutated.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Vec<u8>,
    document: Document,
    page_ids: Vec<ObjectId>,
}

impl SourceDocument {
    /// Parse PDF bytes. Encrypted or page-less documents are rejected.
    pub fn load(bytes: Vec<u8>) -> Result<Self> {
        // Check minimum size and PDF magic bytes before handing off to lopdf
        if bytes.len() < 8 {
            return Err(PageKitError::CorruptSource(
                "file too small to be a valid PDF".into(),
            ));
        }
        if !bytes.starts_with(b"%PDF-") {
            return Err(PageKitError::CorruptSource(
                "missing %PDF- header".into(),
            ));
        }

        let document =
            Document::load_mem(&bytes).map_err(|e| PageKitError::CorruptSource(e.to_string()))?;

        if document.is_encrypted() {
            return Err(PageKitError::CorruptSource(
                "encrypted documents are not supported".into(),
            ));
        }

        // get_pages is keyed by 1-based page number, so values come out in page order
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PageKitError::CorruptSource("PDF has no pages".into()));
        }

        Ok(Self {
            bytes,
            document,
            page_ids,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    /// PDF version string from the header (e.g., "1.7")
    pub fn version(&self) -> &str {
        &self.document.version
    }

    pub(crate) fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of the page at a 0-based position.
    pub(crate) fn page_id(&self, offset: usize) -> Option<ObjectId> {
        self.page_ids.get(offset).copied()
    }
}

/// A freshly built document, serialized and ready to hand to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDocument {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

impl OutputDocument {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Parse PDF bytes and return page count
pub fn page_count(bytes: &[u8]) -> Result<u32> {
    SourceDocument::load(bytes.to_vec()).map(|doc| doc.page_count())
}
