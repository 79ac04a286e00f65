//! Encoders that can be driven by the quality search
//!
//! The search only ever looks at output length; these adapters own the
//! decoded artifact and produce a fresh encoding for each quality asked.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use lopdf::{Document, Object, Stream};
use tracing::debug;

use crate::document::SourceDocument;
use crate::error::{PageKitError, Result};
use crate::quality::{Compressed, QualitySearch};

/// Anything that can be re-encoded at a quality in 1-100.
pub trait QualityCodec {
    fn encode(&self, quality: u8) -> Result<Vec<u8>>;
}

/// Run the quality search over a codec.
pub fn compress<C>(codec: &C, target_bytes: usize, search: &QualitySearch) -> Result<Compressed>
where
    C: QualityCodec + ?Sized,
{
    search.search(target_bytes, |quality| codec.encode(quality))
}

/// Raster image re-encoded as JPEG.
#[derive(Debug, Clone)]
pub struct JpegCodec {
    image: DynamicImage,
}

impl JpegCodec {
    /// Decode any supported raster format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| PageKitError::Codec(format!("failed to decode image: {}", e)))?;
        Ok(Self { image })
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

impl QualityCodec for JpegCodec {
    fn encode(&self, quality: u8) -> Result<Vec<u8>> {
        encode_jpeg(&self.image, quality)
    }
}

/// Encode as JPEG, keeping grayscale images single-channel. Alpha is dropped.
fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    let result = if image.color().has_color() {
        image.to_rgb8().write_with_encoder(encoder)
    } else {
        image.to_luma8().write_with_encoder(encoder)
    };
    result.map_err(|e| PageKitError::Codec(format!("JPEG encoding failed: {}", e)))?;
    Ok(buffer)
}

/// PDF whose embedded JPEG images are re-encoded at the requested quality.
#[derive(Debug, Clone)]
pub struct PdfImageCodec {
    source: SourceDocument,
}

impl PdfImageCodec {
    pub fn new(source: SourceDocument) -> Self {
        Self { source }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        SourceDocument::load(bytes).map(Self::new)
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }
}

impl QualityCodec for PdfImageCodec {
    fn encode(&self, quality: u8) -> Result<Vec<u8>> {
        let mut doc: Document = self.source.document().clone();

        let mut recompressed = 0;
        for object in doc.objects.values_mut() {
            if let Object::Stream(stream) = object {
                if recompress_jpeg_stream(stream, quality) {
                    recompressed += 1;
                }
            }
        }
        debug!("re-encoded {} images at quality {}", recompressed, quality);

        doc.prune_objects();
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| PageKitError::Serialization(format!("Save failed: {}", e)))?;
        Ok(buffer)
    }
}

/// Replace a DCT image stream with a lower quality encoding when that is smaller.
///
/// Streams that are not 8-bit RGB/gray JPEG images are left untouched.
fn recompress_jpeg_stream(stream: &mut Stream, quality: u8) -> bool {
    if !is_name(stream.dict.get(b"Subtype").ok(), b"Image") || !has_only_dct_filter(stream) {
        return false;
    }
    let gray = match stream.dict.get(b"ColorSpace").ok() {
        Some(cs) if is_name(Some(cs), b"DeviceRGB") => false,
        Some(cs) if is_name(Some(cs), b"DeviceGray") => true,
        _ => return false,
    };
    if let Ok(bits) = stream.dict.get(b"BitsPerComponent").and_then(Object::as_i64) {
        if bits != 8 {
            return false;
        }
    }

    let decoded = match image::load(Cursor::new(&stream.content), ImageFormat::Jpeg) {
        Ok(image) => image,
        Err(e) => {
            debug!("skipping undecodable JPEG stream: {}", e);
            return false;
        }
    };
    // Component count must still match the declared color space
    let decoded = if gray {
        DynamicImage::ImageLuma8(decoded.to_luma8())
    } else {
        DynamicImage::ImageRgb8(decoded.to_rgb8())
    };

    match encode_jpeg(&decoded, quality) {
        Ok(bytes) if bytes.len() < stream.content.len() => {
            stream.set_content(bytes);
            true
        }
        _ => false,
    }
}

fn is_name(object: Option<&Object>, name: &[u8]) -> bool {
    matches!(object.and_then(|o| o.as_name().ok()), Some(n) if n == name)
}

fn has_only_dct_filter(stream: &Stream) -> bool {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => name == b"DCTDecode",
        Ok(Object::Array(filters)) => {
            filters.len() == 1 && is_name(filters.first(), b"DCTDecode")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::create_test_pdf;
    use image::{GrayImage, RgbImage};
    use lopdf::Dictionary;

    fn noisy_rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(7919) ^ y.wrapping_mul(104_729) ^ (x * y);
            image::Rgb([(v % 251) as u8, (v / 3 % 241) as u8, (v / 7 % 239) as u8])
        }))
    }

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    /// One-page PDF whose page draws a single DCT-encoded image XObject.
    fn pdf_with_jpeg(jpeg: Vec<u8>, width: u32, height: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let image_id = doc.add_object(Stream::new(
            Dictionary::from_iter(vec![
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(width as i64)),
                ("Height", Object::Integer(height as i64)),
                ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
                ("BitsPerComponent", Object::Integer(8)),
                ("Filter", Object::Name(b"DCTDecode".to_vec())),
            ]),
            jpeg,
        ));
        let content = format!("q {} 0 0 {} 0 0 cm /Im1 Do Q", width, height);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            (
                "Resources",
                Object::Dictionary(Dictionary::from_iter(vec![(
                    "XObject",
                    Object::Dictionary(Dictionary::from_iter(vec![(
                        "Im1",
                        Object::Reference(image_id),
                    )])),
                )])),
            ),
        ]));
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Count", Object::Integer(1)),
                ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_jpeg_codec_lower_quality_is_smaller() {
        let codec = JpegCodec::from_bytes(&png_bytes(&noisy_rgb(96, 96))).unwrap();
        let high = codec.encode(95).unwrap();
        let low = codec.encode(10).unwrap();
        assert!(low.len() < high.len(), "{} >= {}", low.len(), high.len());
    }

    #[test]
    fn test_jpeg_codec_output_decodes_with_same_dimensions() {
        let codec = JpegCodec::from_image(noisy_rgb(40, 30));
        let bytes = codec.encode(50).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), codec.dimensions());
    }

    #[test]
    fn test_jpeg_codec_keeps_grayscale() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_fn(16, 16, |x, y| {
            image::Luma([(x * 16 + y) as u8])
        }));
        let bytes = JpegCodec::from_image(gray).encode(80).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(!decoded.color().has_color());
    }

    #[test]
    fn test_jpeg_codec_rejects_garbage() {
        assert!(matches!(
            JpegCodec::from_bytes(b"definitely not an image"),
            Err(PageKitError::Codec(_))
        ));
    }

    #[test]
    fn test_compress_image_meets_generous_target_at_start() {
        let codec = JpegCodec::from_image(noisy_rgb(32, 32));
        let result = compress(&codec, usize::MAX, &QualitySearch::default()).unwrap();
        assert_eq!(result.quality, 100);
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn test_compress_image_unreachable_target() {
        let codec = JpegCodec::from_image(noisy_rgb(32, 32));
        match compress(&codec, 10, &QualitySearch::default()) {
            Err(PageKitError::SizeTargetUnreachable {
                quality, artifact, ..
            }) => {
                assert_eq!(quality, 10);
                assert!(!artifact.is_empty());
            }
            other => panic!("expected unreachable, got {:?}", other),
        }
    }

    #[test]
    fn test_compress_image_finds_intermediate_quality() {
        let codec = JpegCodec::from_image(noisy_rgb(96, 96));
        let high = codec.encode(100).unwrap().len();
        let low = codec.encode(10).unwrap().len();
        let target = (high + low) / 2;

        let result = compress(&codec, target, &QualitySearch::default()).unwrap();
        assert!(result.bytes.len() <= target);
        assert!(result.quality < 100 && result.quality >= 10);
    }

    #[test]
    fn test_pdf_codec_shrinks_embedded_jpeg() {
        let image = noisy_rgb(128, 128);
        let original_jpeg = encode_jpeg(&image, 100).unwrap();
        let original_len = original_jpeg.len();
        let pdf = pdf_with_jpeg(original_jpeg, 128, 128);

        let codec = PdfImageCodec::from_bytes(pdf.clone()).unwrap();
        let smaller = codec.encode(10).unwrap();

        assert!(smaller.len() < pdf.len());
        let doc = Document::load_mem(&smaller).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        let image_stream = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .find(|s| is_name(s.dict.get(b"Subtype").ok(), b"Image"))
            .unwrap();
        assert!(image_stream.content.len() < original_len);
        assert!(image::load_from_memory_with_format(&image_stream.content, ImageFormat::Jpeg).is_ok());
    }

    #[test]
    fn test_pdf_codec_leaves_text_only_pdf_readable() {
        let codec = PdfImageCodec::from_bytes(create_test_pdf(3, "A")).unwrap();
        let bytes = codec.encode(50).unwrap();
        assert_eq!(SourceDocument::load(bytes).unwrap().page_count(), 3);
    }

    #[test]
    fn test_non_dct_streams_are_skipped() {
        let mut stream = Stream::new(
            Dictionary::from_iter(vec![
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
                ("Filter", Object::Name(b"FlateDecode".to_vec())),
            ]),
            vec![1, 2, 3],
        );
        assert!(!recompress_jpeg_stream(&mut stream, 10));
        assert_eq!(stream.content, vec![1, 2, 3]);
    }

    #[test]
    fn test_cmyk_jpeg_is_skipped() {
        let jpeg = encode_jpeg(&noisy_rgb(8, 8), 90).unwrap();
        let mut stream = Stream::new(
            Dictionary::from_iter(vec![
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("ColorSpace", Object::Name(b"DeviceCMYK".to_vec())),
                ("Filter", Object::Name(b"DCTDecode".to_vec())),
            ]),
            jpeg.clone(),
        );
        assert!(!recompress_jpeg_stream(&mut stream, 10));
        assert_eq!(stream.content, jpeg);
    }
}
