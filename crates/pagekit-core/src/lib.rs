//! Page-set transformations and size-targeted compression
//!
//! Merge, split, extract, remove and reorder all share one pipeline:
//! - [`range::parse`]: page range string to unvalidated tokens
//! - [`page_set::validate`]: tokens bound to a page count under a [`Policy`]
//! - [`recompose::recompose`]: copy the selected pages into a new PDF (lopdf)
//!
//! [`transform`] maps each operation onto that pipeline. Compression is
//! separate: [`QualitySearch`] drives a [`QualityCodec`] down in quality
//! until its output fits a byte budget.

pub mod codec;
pub mod document;
pub mod error;
pub mod page_set;
pub mod quality;
pub mod range;
pub mod recompose;
pub mod transform;

pub use codec::{compress, JpegCodec, PdfImageCodec, QualityCodec};
pub use document::{page_count, OutputDocument, SourceDocument};
pub use error::{PageKitError, Result, SyntaxReason};
pub use page_set::{validate, PageIndex, PageSet, Policy};
pub use quality::{Compressed, QualitySearch};
pub use range::{parse, PageRangeExpression, RangeToken};
pub use recompose::{recompose, PagePick};
pub use transform::{
    execute, execute_with, process, ProcessMetrics, ProcessResult, SplitBundle, SplitPart,
    TransformOptions, TransformOutput, TransformRequest, TransformSpec,
};
