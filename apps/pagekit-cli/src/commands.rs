//! Command implementations: file I/O around the pagekit engine

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use pagekit_core::{
    compress, process, JpegCodec, PageKitError, PdfImageCodec, QualityCodec, QualitySearch,
    SourceDocument, TransformOptions, TransformOutput, TransformSpec,
};
use serde::Serialize;
use tracing::{info, warn};

/// Document summary printed by `pagekit info`
#[derive(Debug, Serialize)]
pub struct DocumentInfo {
    pub file: String,
    pub page_count: u32,
    pub version: String,
    pub size_bytes: usize,
}

pub fn load_source(path: &Path) -> anyhow::Result<SourceDocument> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    SourceDocument::load(bytes).with_context(|| format!("Failed to load {}", path.display()))
}

pub fn info(path: &Path, json: bool) -> anyhow::Result<String> {
    let doc = load_source(path)?;
    let info = DocumentInfo {
        file: path.display().to_string(),
        page_count: doc.page_count(),
        version: doc.version().to_string(),
        size_bytes: doc.bytes().len(),
    };

    if json {
        Ok(serde_json::to_string_pretty(&info)?)
    } else {
        Ok(format!(
            "{}: {} pages, PDF {}, {} bytes",
            info.file, info.page_count, info.version, info.size_bytes
        ))
    }
}

/// Run a transform that yields a single document and write it to `output`.
pub fn transform_to_file(spec: TransformSpec, output: &Path) -> anyhow::Result<String> {
    let result = process(&spec, &TransformOptions::default())?;
    let metrics = result.metrics;
    match result.output {
        TransformOutput::Document(doc) => {
            write_output(output, &doc.bytes)?;
            Ok(format!(
                "Wrote {} ({} pages, {} bytes) in {}ms",
                output.display(),
                doc.page_count,
                doc.len(),
                metrics.processing_time_ms
            ))
        }
        TransformOutput::Bundle(_) => bail!("{} produced several documents", spec.name()),
    }
}

/// Split `input` and write one file per range into `out_dir`.
pub fn split_to_dir(
    input: &Path,
    ranges: Vec<String>,
    out_dir: &Path,
    stem: Option<String>,
) -> anyhow::Result<Vec<PathBuf>> {
    let stem = stem.unwrap_or_else(|| {
        input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "split".to_string())
    });
    let spec = TransformSpec::Split {
        document: load_source(input)?,
        ranges,
    };

    let result = process(&spec, &TransformOptions { split_stem: stem })?;
    let Some(bundle) = result.output.into_bundle() else {
        bail!("split did not produce a bundle");
    };

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut written = Vec::with_capacity(bundle.len());
    for part in bundle.parts {
        let path = out_dir.join(&part.name);
        write_output(&path, &part.document.bytes)?;
        info!(
            "range '{}' -> {} ({} pages)",
            part.range,
            path.display(),
            part.document.page_count
        );
        written.push(path);
    }
    Ok(written)
}

/// Which codec a compress command drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressKind {
    Image,
    Pdf,
}

pub fn compress_to_file(
    kind: CompressKind,
    input: &Path,
    output: &Path,
    target_bytes: usize,
    search: &QualitySearch,
    accept_larger: bool,
) -> anyhow::Result<String> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let input_len = bytes.len();

    let codec: Box<dyn QualityCodec> = match kind {
        CompressKind::Image => Box::new(JpegCodec::from_bytes(&bytes)?),
        CompressKind::Pdf => Box::new(PdfImageCodec::from_bytes(bytes)?),
    };

    match compress(codec.as_ref(), target_bytes, search) {
        Ok(found) => {
            write_output(output, &found.bytes)?;
            Ok(format!(
                "Wrote {} ({} -> {} bytes, quality {}, {} attempts)",
                output.display(),
                input_len,
                found.bytes.len(),
                found.quality,
                found.attempts
            ))
        }
        Err(PageKitError::SizeTargetUnreachable {
            target_bytes,
            quality,
            artifact,
        }) if accept_larger => {
            warn!(
                "target of {} bytes not reached; keeping {} bytes at quality {}",
                target_bytes,
                artifact.len(),
                quality
            );
            write_output(output, &artifact)?;
            Ok(format!(
                "Wrote {} ({} -> {} bytes, quality {}, above target {})",
                output.display(),
                input_len,
                artifact.len(),
                quality,
                target_bytes
            ))
        }
        Err(e) => Err(e.into()),
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}
