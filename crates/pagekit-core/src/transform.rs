//! Merge, split, extract, remove and reorder
//!
//! Every operation runs the same pipeline: parse the caller's range string,
//! validate it against the document under the operation's policy, then hand
//! the resulting page list to [`recompose`]. All validation finishes before
//! the first output document is built.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::{OutputDocument, SourceDocument};
use crate::error::{PageKitError, Result};
use crate::page_set::{validate, PageSet, Policy};
use crate::range::parse;
use crate::recompose::{recompose, PagePick};

/// Wire shape of a transform request: raw PDF bytes plus range strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TransformRequest {
    Merge { files: Vec<Vec<u8>> },
    Split { file: Vec<u8>, ranges: Vec<String> },
    Extract { file: Vec<u8>, keep: String },
    Remove { file: Vec<u8>, drop: String },
    Reorder { file: Vec<u8>, order: String },
}

impl TransformRequest {
    /// Load every document the request carries.
    pub fn into_spec(self) -> Result<TransformSpec> {
        Ok(match self {
            TransformRequest::Merge { files } => TransformSpec::Merge {
                documents: files
                    .into_iter()
                    .enumerate()
                    .map(|(i, bytes)| {
                        SourceDocument::load(bytes).map_err(|e| {
                            PageKitError::CorruptSource(format!("document {}: {}", i + 1, e))
                        })
                    })
                    .collect::<Result<_>>()?,
            },
            TransformRequest::Split { file, ranges } => TransformSpec::Split {
                document: SourceDocument::load(file)?,
                ranges,
            },
            TransformRequest::Extract { file, keep } => TransformSpec::Extract {
                document: SourceDocument::load(file)?,
                keep,
            },
            TransformRequest::Remove { file, drop } => TransformSpec::Remove {
                document: SourceDocument::load(file)?,
                drop,
            },
            TransformRequest::Reorder { file, order } => TransformSpec::Reorder {
                document: SourceDocument::load(file)?,
                order,
            },
        })
    }
}

/// A page-set transformation over loaded documents.
#[derive(Debug, Clone)]
pub enum TransformSpec {
    /// All pages of every document, documents in the given order.
    Merge { documents: Vec<SourceDocument> },
    /// One output per range string; ranges may overlap.
    Split {
        document: SourceDocument,
        ranges: Vec<String>,
    },
    /// Keep the named pages, in document order.
    Extract {
        document: SourceDocument,
        keep: String,
    },
    /// Keep every page except the named ones.
    Remove {
        document: SourceDocument,
        drop: String,
    },
    /// Rearrange pages; the order must name every page exactly once.
    Reorder {
        document: SourceDocument,
        order: String,
    },
}

impl TransformSpec {
    pub fn name(&self) -> &'static str {
        match self {
            TransformSpec::Merge { .. } => "merge",
            TransformSpec::Split { .. } => "split",
            TransformSpec::Extract { .. } => "extract",
            TransformSpec::Remove { .. } => "remove",
            TransformSpec::Reorder { .. } => "reorder",
        }
    }

    fn input_size_bytes(&self) -> usize {
        match self {
            TransformSpec::Merge { documents } => documents.iter().map(|d| d.bytes().len()).sum(),
            TransformSpec::Split { document, .. }
            | TransformSpec::Extract { document, .. }
            | TransformSpec::Remove { document, .. }
            | TransformSpec::Reorder { document, .. } => document.bytes().len(),
        }
    }
}

/// One split output with the file name it is delivered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPart {
    pub name: String,
    /// The range string this part was built from, as written.
    pub range: String,
    pub document: OutputDocument,
}

/// Ordered split outputs, packaged for delivery together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitBundle {
    pub parts: Vec<SplitPart>,
}

impl SplitBundle {
    fn new(stem: &str, outputs: Vec<(String, OutputDocument)>) -> Self {
        let parts = outputs
            .into_iter()
            .enumerate()
            .map(|(i, (range, document))| SplitPart {
                name: format!("{}_part_{}.pdf", stem, i + 1),
                range,
                document,
            })
            .collect();
        Self { parts }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutput {
    Document(OutputDocument),
    Bundle(SplitBundle),
}

impl TransformOutput {
    pub fn output_size_bytes(&self) -> usize {
        match self {
            TransformOutput::Document(doc) => doc.len(),
            TransformOutput::Bundle(bundle) => bundle.parts.iter().map(|p| p.document.len()).sum(),
        }
    }

    pub fn page_count(&self) -> u32 {
        match self {
            TransformOutput::Document(doc) => doc.page_count,
            TransformOutput::Bundle(bundle) => {
                bundle.parts.iter().map(|p| p.document.page_count).sum()
            }
        }
    }

    pub fn into_document(self) -> Option<OutputDocument> {
        match self {
            TransformOutput::Document(doc) => Some(doc),
            TransformOutput::Bundle(_) => None,
        }
    }

    pub fn into_bundle(self) -> Option<SplitBundle> {
        match self {
            TransformOutput::Bundle(bundle) => Some(bundle),
            TransformOutput::Document(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub output: TransformOutput,
    pub metrics: ProcessMetrics,
}

/// Options that shape delivery but not page selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// File name stem for split parts.
    pub split_stem: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            split_stem: "split".to_string(),
        }
    }
}

/// Run a transform with default options.
pub fn execute(spec: &TransformSpec) -> Result<TransformOutput> {
    execute_with(spec, &TransformOptions::default())
}

pub fn execute_with(spec: &TransformSpec, options: &TransformOptions) -> Result<TransformOutput> {
    match spec {
        TransformSpec::Merge { documents } => merge(documents).map(TransformOutput::Document),
        TransformSpec::Split { document, ranges } => {
            split(document, ranges, &options.split_stem).map(TransformOutput::Bundle)
        }
        TransformSpec::Extract { document, keep } => {
            let keep = select(document, keep, Policy::Set)?;
            single(document, &keep).map(TransformOutput::Document)
        }
        TransformSpec::Remove { document, drop } => {
            let remaining = select(document, drop, Policy::Set)?.complement()?;
            single(document, &remaining).map(TransformOutput::Document)
        }
        TransformSpec::Reorder { document, order } => {
            let order = select(document, order, Policy::Permutation)?;
            single(document, &order).map(TransformOutput::Document)
        }
    }
}

/// Run a transform and report sizes and timing alongside the output.
pub fn process(spec: &TransformSpec, options: &TransformOptions) -> Result<ProcessResult> {
    let started = Instant::now();
    let output = execute_with(spec, options)?;

    let metrics = ProcessMetrics {
        input_size_bytes: spec.input_size_bytes(),
        output_size_bytes: output.output_size_bytes(),
        page_count: output.page_count(),
        processing_time_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        "{} produced {} pages ({} -> {} bytes) in {}ms",
        spec.name(),
        metrics.page_count,
        metrics.input_size_bytes,
        metrics.output_size_bytes,
        metrics.processing_time_ms
    );

    Ok(ProcessResult { output, metrics })
}

fn select(document: &SourceDocument, input: &str, policy: Policy) -> Result<PageSet> {
    let expr = parse(input)?;
    validate(&expr, document.page_count(), policy)
}

fn single(document: &SourceDocument, pages: &PageSet) -> Result<OutputDocument> {
    recompose(&[PagePick::new(document, pages.pages())])
}

fn merge(documents: &[SourceDocument]) -> Result<OutputDocument> {
    if documents.len() < 2 {
        return Err(PageKitError::Configuration(format!(
            "merge needs at least 2 documents, got {}",
            documents.len()
        )));
    }

    let selections: Vec<PageSet> = documents
        .iter()
        .map(|doc| PageSet::all(doc.page_count()))
        .collect();
    let picks: Vec<PagePick<'_>> = documents
        .iter()
        .zip(&selections)
        .map(|(doc, set)| PagePick::new(doc, set.pages()))
        .collect();

    recompose(&picks)
}

fn split(document: &SourceDocument, ranges: &[String], stem: &str) -> Result<SplitBundle> {
    if ranges.is_empty() {
        return Err(PageKitError::Configuration(
            "split needs at least one range".into(),
        ));
    }

    // Validate every range up front so a bad one aborts before any output exists
    let selections = ranges
        .iter()
        .map(|range| select(document, range, Policy::Sequence))
        .collect::<Result<Vec<_>>>()?;

    let outputs = ranges
        .iter()
        .zip(&selections)
        .map(|(range, set)| -> Result<(String, OutputDocument)> {
            Ok((range.clone(), single(document, set)?))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SplitBundle::new(stem, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::{create_test_pdf, page_labels};
    use pretty_assertions::assert_eq;

    fn load(pages: u32, label: &str) -> SourceDocument {
        SourceDocument::load(create_test_pdf(pages, label)).unwrap()
    }

    fn labels(output: TransformOutput) -> Vec<String> {
        page_labels(&output.into_document().unwrap().bytes)
    }

    #[test]
    fn test_request_deserializes_merge() {
        let json = r#"{"type":"Merge","files":[]}"#;
        let req: TransformRequest = serde_json::from_str(json).unwrap();
        assert!(matches!(req, TransformRequest::Merge { .. }));
    }

    #[test]
    fn test_request_deserializes_split() {
        let json = r#"{"type":"Split","file":[],"ranges":["1-3","5"]}"#;
        let req: TransformRequest = serde_json::from_str(json).unwrap();
        match req {
            TransformRequest::Split { ranges, .. } => assert_eq!(ranges, vec!["1-3", "5"]),
            other => panic!("expected split, got {:?}", other),
        }
    }

    #[test]
    fn test_request_with_garbage_file_is_corrupt_source() {
        let req = TransformRequest::Extract {
            file: b"not a pdf".to_vec(),
            keep: "1".into(),
        };
        assert!(matches!(
            req.into_spec(),
            Err(PageKitError::CorruptSource(_))
        ));
    }

    #[test]
    fn test_request_merge_names_bad_document() {
        let req = TransformRequest::Merge {
            files: vec![create_test_pdf(1, "A"), b"junk junk junk".to_vec()],
        };
        let err = req.into_spec().unwrap_err();
        assert!(err.to_string().contains("document 2"), "{}", err);
    }

    #[test]
    fn test_extract_follows_document_order() {
        let spec = TransformSpec::Extract {
            document: load(10, "A"),
            keep: "8, 3-5, 1, 4".into(),
        };
        assert_eq!(
            labels(execute(&spec).unwrap()),
            vec!["A-Page-1", "A-Page-3", "A-Page-4", "A-Page-5", "A-Page-8"]
        );
    }

    #[test]
    fn test_remove_keeps_complement() {
        let spec = TransformSpec::Remove {
            document: load(5, "A"),
            drop: "2,4".into(),
        };
        assert_eq!(
            labels(execute(&spec).unwrap()),
            vec!["A-Page-1", "A-Page-3", "A-Page-5"]
        );
    }

    #[test]
    fn test_remove_everything_is_empty_result() {
        let spec = TransformSpec::Remove {
            document: load(3, "A"),
            drop: "1-3".into(),
        };
        assert!(matches!(
            execute(&spec),
            Err(PageKitError::EmptyResultSet(_))
        ));
    }

    #[test]
    fn test_reorder_uses_given_order() {
        let spec = TransformSpec::Reorder {
            document: load(3, "A"),
            order: "3,1,2".into(),
        };
        assert_eq!(
            labels(execute(&spec).unwrap()),
            vec!["A-Page-3", "A-Page-1", "A-Page-2"]
        );
    }

    #[test]
    fn test_reorder_rejects_duplicates() {
        let spec = TransformSpec::Reorder {
            document: load(3, "A"),
            order: "1,1,2".into(),
        };
        match execute(&spec) {
            Err(PageKitError::PermutationMismatch {
                missing,
                duplicated,
            }) => {
                assert_eq!(missing, vec![3]);
                assert_eq!(duplicated, vec![1]);
            }
            other => panic!("expected permutation mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_split_produces_one_part_per_range() {
        let spec = TransformSpec::Split {
            document: load(4, "A"),
            ranges: vec!["1-2".into(), "3-4".into()],
        };
        let bundle = execute(&spec).unwrap().into_bundle().unwrap();

        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.parts[0].name, "split_part_1.pdf");
        assert_eq!(bundle.parts[1].range, "3-4");
        assert_eq!(
            page_labels(&bundle.parts[0].document.bytes),
            vec!["A-Page-1", "A-Page-2"]
        );
        assert_eq!(
            page_labels(&bundle.parts[1].document.bytes),
            vec!["A-Page-3", "A-Page-4"]
        );
    }

    #[test]
    fn test_split_allows_overlap_and_order() {
        let spec = TransformSpec::Split {
            document: load(4, "A"),
            ranges: vec!["2-3".into(), "4,1".into(), "3".into()],
        };
        let bundle = execute(&spec).unwrap().into_bundle().unwrap();
        assert_eq!(
            page_labels(&bundle.parts[1].document.bytes),
            vec!["A-Page-4", "A-Page-1"]
        );
        assert_eq!(bundle.parts[2].document.page_count, 1);
    }

    #[test]
    fn test_split_is_all_or_nothing() {
        let spec = TransformSpec::Split {
            document: load(4, "A"),
            ranges: vec!["1-2".into(), "3-9".into()],
        };
        assert!(matches!(
            execute(&spec),
            Err(PageKitError::OutOfBounds {
                index: 5,
                page_count: 4
            })
        ));
    }

    #[test]
    fn test_split_without_ranges_is_configuration_error() {
        let spec = TransformSpec::Split {
            document: load(2, "A"),
            ranges: vec![],
        };
        assert!(matches!(
            execute(&spec),
            Err(PageKitError::Configuration(_))
        ));
    }

    #[test]
    fn test_split_uses_stem_option() {
        let spec = TransformSpec::Split {
            document: load(2, "A"),
            ranges: vec!["1".into()],
        };
        let options = TransformOptions {
            split_stem: "report".into(),
        };
        let bundle = execute_with(&spec, &options).unwrap().into_bundle().unwrap();
        assert_eq!(bundle.parts[0].name, "report_part_1.pdf");
    }

    #[test]
    fn test_merge_needs_two_documents() {
        for count in [0, 1] {
            let spec = TransformSpec::Merge {
                documents: (0..count).map(|_| load(2, "A")).collect(),
            };
            assert!(matches!(
                execute(&spec),
                Err(PageKitError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_merge_preserves_document_order() {
        let spec = TransformSpec::Merge {
            documents: vec![load(2, "First"), load(1, "Second"), load(2, "Third")],
        };
        assert_eq!(
            labels(execute(&spec).unwrap()),
            vec![
                "First-Page-1",
                "First-Page-2",
                "Second-Page-1",
                "Third-Page-1",
                "Third-Page-2"
            ]
        );
    }

    #[test]
    fn test_syntax_error_surfaces_from_dispatch() {
        let spec = TransformSpec::Extract {
            document: load(10, "A"),
            keep: "5-3".into(),
        };
        assert!(matches!(execute(&spec), Err(PageKitError::Syntax { .. })));
    }

    #[test]
    fn test_process_reports_metrics() {
        let spec = TransformSpec::Merge {
            documents: vec![load(2, "A"), load(3, "B")],
        };
        let result = process(&spec, &TransformOptions::default()).unwrap();
        assert_eq!(result.metrics.page_count, 5);
        assert!(result.metrics.input_size_bytes > 0);
        assert_eq!(
            result.metrics.output_size_bytes,
            result.output.output_size_bytes()
        );
    }
}
