//! Building one PDF out of heterogeneous inputs.
//!
//! # Page tree strategy
//!
//! The output is a flat page tree: one `Pages` node whose `Kids` lists every
//! page in input order. Copied PDFs are renumbered past the objects already
//! in the output, their own `Catalog`/`Pages`/outline objects are dropped and
//! attributes their pages inherited from those nodes (`Resources`,
//! `MediaBox`, `CropBox`, `Rotate`) are written onto the page itself.
//!
//! Raster inputs become a single page of exactly the image's pixel size with
//! one DCT-encoded image XObject painted over the full page.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::input::{InputFile, InputKind};
use crate::raster::{
    DEFAULT_IMAGE_CAP_BYTES, DEFAULT_MAX_PIXELS, EncodedPage, ImageJpegEncoder, JpegEncode,
    encode_capped, rasterize,
};

/// Attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in broken files
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page declares no media box anywhere
const FALLBACK_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

/// Resource name of the full-page image on raster pages
const IMAGE_RESOURCE: &str = "Im0";

/// Options for document assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleOptions {
    /// Pixel budget for decoded raster inputs
    pub max_pixels: u64,
    /// Byte size the per-image quality ladder aims for
    pub image_cap_bytes: u64,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
            image_cap_bytes: DEFAULT_IMAGE_CAP_BYTES,
        }
    }
}

/// A finished in-memory PDF object graph
#[derive(Debug)]
pub struct AssembledDocument {
    document: Document,
    page_count: usize,
}

impl AssembledDocument {
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Serialize to PDF bytes
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save assembled PDF: {e}")))?;
        Ok(output)
    }
}

/// Accumulates pages into a flat page tree
pub(crate) struct PageTreeBuilder {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl PageTreeBuilder {
    pub(crate) fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Copy every page of a serialized PDF, in order. Returns the page count.
    pub(crate) fn append_pdf(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut source = Document::load_mem(bytes)
            .map_err(|e| Error::InvalidPdf(format!("Failed to parse PDF: {e}")))?;

        source.renumber_objects_with(self.document.max_id + 1);
        self.document.max_id = self.document.max_id.max(source.max_id);

        let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
        if page_ids.is_empty() {
            warn!("PDF input has no pages");
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for &page_id in &page_ids {
            pages.push((page_id, flatten_page(&source, page_id)?));
        }

        for (object_id, object) in source.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    self.document.objects.insert(object_id, object);
                }
            }
        }

        for (page_id, mut page) in pages {
            page.set("Parent", Object::Reference(self.pages_id));
            self.document.objects.insert(page_id, Object::Dictionary(page));
            self.kids.push(page_id);
        }

        Ok(page_ids.len())
    }

    /// Add one page sized to the image, showing the JPEG edge to edge
    pub(crate) fn append_jpeg_page(&mut self, page: EncodedPage) -> Result<()> {
        let width = i64::from(page.width);
        let height = i64::from(page.height);

        let image_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(width)),
            ("Height", Object::Integer(height)),
            ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
            ("Filter", Object::Name(b"DCTDecode".to_vec())),
        ]);
        let image_id = self.document.add_object(Stream::new(image_dict, page.bytes));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(height),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| Error::PdfSave(format!("Failed to encode page content: {e}")))?;
        let content_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), content_bytes));

        let resources = Dictionary::from_iter([(
            "XObject",
            Object::Dictionary(Dictionary::from_iter([(
                IMAGE_RESOURCE,
                Object::Reference(image_id),
            )])),
        )]);

        let page_id = self.document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width),
                    Object::Integer(height),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
            ("Contents", Object::Reference(content_id)),
        ]));
        self.kids.push(page_id);

        Ok(())
    }

    pub(crate) fn finish(mut self) -> AssembledDocument {
        let page_count = self.kids.len();
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();

        let pages_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(i64::try_from(page_count).unwrap_or(i64::MAX))),
        ]);
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.document.trailer.set("Root", Object::Reference(catalog_id));

        self.document.compress();

        AssembledDocument {
            document: self.document,
            page_count,
        }
    }
}

/// Clone a page dictionary with inherited attributes made explicit
fn flatten_page(source: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = source
        .get_dictionary(page_id)
        .map_err(|e| Error::InvalidPdf(format!("Failed to read page {page_id:?}: {e}")))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    let mut depth = 0;

    while let Some(parent_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = source.get_dictionary(parent_id) else {
            break;
        };

        for key in INHERITABLE_KEYS {
            if !page.has(key)
                && let Ok(value) = node.get(key)
            {
                page.set(key.to_vec(), value.clone());
            }
        }

        parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
        depth += 1;
    }

    if !page.has(b"MediaBox") {
        page.set(
            "MediaBox",
            Object::Array(FALLBACK_MEDIA_BOX.iter().map(|&v| Object::Integer(v)).collect()),
        );
    }

    Ok(page)
}

/// Merges PDFs and raster images into one document
pub struct DocumentAssembler<E = ImageJpegEncoder> {
    options: AssembleOptions,
    encoder: E,
}

impl DocumentAssembler {
    pub const fn new(options: AssembleOptions) -> Self {
        Self {
            options,
            encoder: ImageJpegEncoder,
        }
    }
}

impl<E: JpegEncode> DocumentAssembler<E> {
    /// Use a custom JPEG encoder for raster inputs
    pub const fn with_encoder(options: AssembleOptions, encoder: E) -> Self {
        Self { options, encoder }
    }

    /// Assemble `inputs` into one document, in order.
    ///
    /// Every media type is checked before any input is processed; the first
    /// failure aborts the whole assembly.
    pub fn assemble(&self, inputs: &[InputFile]) -> Result<AssembledDocument> {
        self.assemble_with_progress(inputs, |_, _| {})
    }

    /// [`DocumentAssembler::assemble`], calling `progress(done, total)` after
    /// each input.
    pub fn assemble_with_progress(
        &self,
        inputs: &[InputFile],
        mut progress: impl FnMut(usize, usize),
    ) -> Result<AssembledDocument> {
        if inputs.is_empty() {
            return Err(Error::EmptyInput);
        }
        inputs.iter().try_for_each(InputFile::ensure_supported)?;

        info!("Assembling {} inputs", inputs.len());
        let mut builder = PageTreeBuilder::new();

        for (i, input) in inputs.iter().enumerate() {
            match input.kind() {
                InputKind::Pdf => {
                    let added = builder.append_pdf(input.bytes())?;
                    debug!("Input {}: copied {} PDF pages", i + 1, added);
                }
                InputKind::Image(kind) => {
                    let surface = rasterize(input, self.options.max_pixels)?;
                    let page = encode_capped(&self.encoder, &surface, self.options.image_cap_bytes)?;
                    drop(surface);
                    debug!(
                        "Input {}: {} image as {}x{} page ({} bytes at quality {})",
                        i + 1,
                        kind.media_type(),
                        page.width,
                        page.height,
                        page.byte_len(),
                        page.quality
                    );
                    builder.append_jpeg_page(page)?;
                }
                InputKind::Unsupported(media_type) => {
                    return Err(Error::UnsupportedFileType(media_type));
                }
            }
            progress(i + 1, inputs.len());
        }

        Ok(builder.finish())
    }
}

/// Assemble with default options
pub fn assemble(inputs: &[InputFile]) -> Result<AssembledDocument> {
    DocumentAssembler::new(AssembleOptions::default()).assemble(inputs)
}

/// Build a raster-only document, one page per encoded image
pub fn assemble_jpeg_pages(pages: Vec<EncodedPage>) -> Result<AssembledDocument> {
    let mut builder = PageTreeBuilder::new();
    for page in pages {
        builder.append_jpeg_page(page)?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::raster::Quality;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    /// Build a PDF with one Helvetica text page per label, sized `width x height`.
    ///
    /// `MediaBox` and `Resources` live on the `Pages` node so copying has to
    /// resolve inheritance.
    pub(crate) fn create_test_pdf(labels: &[&str], width: i64, height: i64) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let page_tree_id = doc.new_object_id();

        let font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));
        let resources_id = doc.add_object(Dictionary::from_iter([(
            "Font",
            Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
        )]));

        let mut kids = Vec::new();
        for label in labels {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), Object::Integer(24)]),
                    Operation::new("Td", vec![Object::Integer(50), Object::Integer(50)]),
                    Operation::new("Tj", vec![Object::string_literal(*label)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(page_tree_id)),
                ("Contents", Object::Reference(content_id)),
            ]));
            kids.push(Object::Reference(page_id));
        }

        let page_tree = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(i64::try_from(kids.len()).unwrap())),
            ("Kids", Object::Array(kids)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width),
                    Object::Integer(height),
                ]),
            ),
        ]);
        doc.objects.insert(page_tree_id, Object::Dictionary(page_tree));

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(page_tree_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        doc.save_to(&mut output).unwrap();
        output
    }

    pub(crate) fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn page_texts(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let content = doc.get_page_content(id).unwrap();
                String::from_utf8_lossy(&content).into_owned()
            })
            .collect()
    }

    fn media_box(doc: &Document, page_id: ObjectId) -> Vec<i64> {
        doc.get_dictionary(page_id)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_empty_input_fails() {
        let result = assemble(&[]);
        assert!(matches!(result, Err(Error::EmptyInput)));
    }

    #[test]
    fn test_pdf_pages_in_input_order() {
        let a = create_test_pdf(&["A1"], 300, 400);
        let b = create_test_pdf(&["B1", "B2"], 500, 600);

        let assembled = assemble(&[InputFile::pdf(a), InputFile::pdf(b)]).unwrap();
        assert_eq!(assembled.page_count(), 3);

        let bytes = assembled.into_bytes().unwrap();
        let texts = page_texts(&bytes);
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("A1"));
        assert!(texts[1].contains("B1"));
        assert!(texts[2].contains("B2"));
    }

    #[test]
    fn test_inherited_attributes_resolved() {
        let a = create_test_pdf(&["A1"], 300, 400);
        let bytes = assemble(&[InputFile::pdf(a)]).unwrap().into_bytes().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        assert_eq!(media_box(&doc, page_id), vec![0, 0, 300, 400]);
        assert!(doc.get_dictionary(page_id).unwrap().has(b"Resources"));
    }

    #[test]
    fn test_image_becomes_single_page_of_pixel_size() {
        let png = create_test_png(120, 80);
        let assembled =
            assemble(&[InputFile::image(png, crate::input::ImageKind::Png)]).unwrap();
        assert_eq!(assembled.page_count(), 1);

        let bytes = assembled.into_bytes().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        assert_eq!(media_box(&doc, page_id), vec![0, 0, 120, 80]);
    }

    #[test]
    fn test_mixed_inputs() {
        let pdf = create_test_pdf(&["P1", "P2"], 200, 200);
        let png = create_test_png(40, 30);

        let assembled = assemble(&[
            InputFile::image(png.clone(), crate::input::ImageKind::Png),
            InputFile::pdf(pdf),
            InputFile::image(png, crate::input::ImageKind::Png),
        ])
        .unwrap();
        assert_eq!(assembled.page_count(), 4);

        let bytes = assembled.into_bytes().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(media_box(&doc, pages[&1]), vec![0, 0, 40, 30]);
        assert_eq!(media_box(&doc, pages[&2]), vec![0, 0, 200, 200]);
        assert_eq!(media_box(&doc, pages[&4]), vec![0, 0, 40, 30]);
    }

    #[test]
    fn test_unsupported_type_aborts_before_work() {
        let pdf = create_test_pdf(&["A1"], 100, 100);
        let err = assemble(&[
            InputFile::pdf(pdf),
            InputFile::new(b"hello".to_vec(), "text/plain"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(ref t) if t == "text/plain"));
        assert!(err.to_string().contains("text/plain"));
    }

    #[test]
    fn test_progress_reported_per_input() {
        let pdf = create_test_pdf(&["A1", "A2"], 100, 100);
        let png = create_test_png(8, 8);
        let mut seen = Vec::new();

        DocumentAssembler::new(AssembleOptions::default())
            .assemble_with_progress(
                &[
                    InputFile::pdf(pdf),
                    InputFile::image(png, crate::input::ImageKind::Png),
                ],
                |done, total| seen.push((done, total)),
            )
            .unwrap();

        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_corrupt_pdf_fails_whole_assembly() {
        let good = create_test_pdf(&["A1"], 100, 100);
        let result = assemble(&[InputFile::pdf(good), InputFile::pdf(b"%PDF-garbage".to_vec())]);
        assert!(matches!(result, Err(Error::InvalidPdf(_))));
    }

    #[test]
    fn test_undecodable_image_fails() {
        let result = assemble(&[InputFile::new(vec![1, 2, 3, 4], "image/png")]);
        assert!(matches!(result, Err(Error::ImageDecode(_))));
    }

    #[test]
    fn test_assemble_jpeg_pages_embeds_dct_streams() {
        let page = EncodedPage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 10,
            height: 20,
            quality: Quality::MAX,
        };
        let bytes = assemble_jpeg_pages(vec![page.clone(), page])
            .unwrap()
            .into_bytes()
            .unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        let dct_streams = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| {
                s.dict
                    .get(b"Filter")
                    .and_then(|f| f.as_name())
                    .is_ok_and(|n| n == b"DCTDecode")
            })
            .count();
        assert_eq!(dct_streams, 2);
    }

    /// Encoder that never gets under any cap
    struct OversizedEncoder {
        calls: std::cell::Cell<u32>,
    }

    impl JpegEncode for OversizedEncoder {
        fn encode(
            &self,
            surface: &crate::raster::PixelSurface,
            quality: Quality,
        ) -> Result<EncodedPage> {
            self.calls.set(self.calls.get() + 1);
            ImageJpegEncoder.encode(surface, quality)
        }
    }

    #[test]
    fn test_custom_encoder_runs_full_ladder() {
        let encoder = OversizedEncoder {
            calls: std::cell::Cell::new(0),
        };
        let options = AssembleOptions {
            image_cap_bytes: 0,
            ..AssembleOptions::default()
        };
        let assembler = DocumentAssembler::with_encoder(options, encoder);

        let doc = assembler
            .assemble(&[
                InputFile::image(create_test_png(8, 8), crate::input::ImageKind::Png),
                InputFile::pdf(create_test_pdf(&["A"], 100, 100)),
            ])
            .unwrap();

        assert_eq!(doc.page_count(), 2);
        // 1.0 down to 0.1, one image input
        assert_eq!(assembler.encoder.calls.get(), 10);
    }
}
