//! Test fixtures: minimal office packages, generated PDFs and fake
//! collaborators.

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use image::{Rgba, RgbaImage};
use lopdf::{dictionary, Document, Object};
use tokio::sync::Notify;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PreviewError, Result};
use crate::html::escape;
use crate::pdf::{PageRasterizer, PdfDocument};
use crate::raster::RasterImage;
use crate::remote::RemoteConverter;

const CONTENT_TYPES_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#;

pub fn zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn package_rels(target: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="{}"/></Relationships>"#,
        target
    )
}

/// A slide part whose paragraphs each hold one text run.
pub fn slide_xml(texts: &[&str]) -> String {
    let paragraphs: String = texts
        .iter()
        .map(|t| format!("<a:p><a:r><a:rPr lang=\"en-US\"/><a:t>{}</a:t></a:r></a:p>", escape(t)))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/>{}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
        paragraphs
    )
}

/// A presentation package with `slides[i]` stored as `slide{i+1}.xml`.
pub fn pptx(slides: &[&str]) -> Vec<u8> {
    let content_types = format!(
        "{}<Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/></Types>",
        CONTENT_TYPES_HEAD
    );
    let rels = package_rels("ppt/presentation.xml");
    let names: Vec<String> = (1..=slides.len()).map(|i| format!("ppt/slides/slide{}.xml", i)).collect();

    let mut entries: Vec<(&str, &str)> = vec![
        ("[Content_Types].xml", content_types.as_str()),
        ("_rels/.rels", rels.as_str()),
        ("ppt/presentation.xml", "<p:presentation xmlns:p=\"p\"/>"),
    ];
    // Store out of order so tests exercise sorting.
    for (name, slide) in names.iter().zip(slides.iter()).rev() {
        entries.push((name.as_str(), *slide));
    }
    zip(&entries)
}

/// A workbook with one sheet. Cells that parse as numbers are stored as
/// numbers, everything else as inline strings.
pub fn xlsx(rows: &[&[&str]]) -> Vec<u8> {
    let content_types = format!(
        "{}<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/><Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/></Types>",
        CONTENT_TYPES_HEAD
    );
    let rels = package_rels("xl/workbook.xml");
    let workbook = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
    let workbook_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

    let mut sheet_data = String::new();
    for (r, row) in rows.iter().enumerate() {
        sheet_data.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, value) in row.iter().enumerate() {
            let reference = format!("{}{}", (b'A' + c as u8) as char, r + 1);
            if value.parse::<f64>().is_ok() {
                sheet_data.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", reference, value));
            } else {
                sheet_data.push_str(&format!(
                    "<c r=\"{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                    reference,
                    escape(value)
                ));
            }
        }
        sheet_data.push_str("</row>");
    }
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        sheet_data
    );

    zip(&[
        ("[Content_Types].xml", content_types.as_str()),
        ("_rels/.rels", rels.as_str()),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", workbook_rels),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ])
}

/// A word-processing package whose body is `body` (WordprocessingML using
/// the `w:` prefix).
pub fn docx(body: &str) -> Vec<u8> {
    let content_types = format!(
        "{}<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/><Override PartName=\"/word/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml\"/></Types>",
        CONTENT_TYPES_HEAD
    );
    let rels = package_rels("word/document.xml");
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    let document_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;
    let styles = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"></w:styles>"#;

    zip(&[
        ("[Content_Types].xml", content_types.as_str()),
        ("_rels/.rels", rels.as_str()),
        ("word/document.xml", document.as_str()),
        ("word/_rels/document.xml.rels", document_rels),
        ("word/styles.xml", styles),
    ])
}

/// A PDF with one empty page per `(width, height)` entry, in points.
pub fn pdf(pages: &[(i64, i64)]) -> Vec<u8> {
    let rotated: Vec<(i64, i64, i64)> = pages.iter().map(|&(w, h)| (w, h, 0)).collect();
    rotated_pdf(&rotated)
}

/// Like [`pdf`], with a `/Rotate` value per page.
pub fn rotated_pdf(pages: &[(i64, i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for &(width, height, rotate) in pages {
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Rotate" => Object::Integer(rotate),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Renders white pages of the right size, optionally failing one page.
#[derive(Debug, Default)]
pub struct SolidRasterizer {
    fail_on: Option<u32>,
}

impl SolidRasterizer {
    pub fn failing_on(page: u32) -> Self {
        Self { fail_on: Some(page) }
    }
}

impl PageRasterizer for SolidRasterizer {
    fn render_page(&self, document: &PdfDocument, page: u32, scale: f32) -> Result<RasterImage> {
        if self.fail_on == Some(page) {
            return Err(PreviewError::RasterizationFailed {
                page,
                reason: "simulated failure".to_string(),
            });
        }
        let size = document.page_size(page).ok_or_else(|| PreviewError::RasterizationFailed {
            page,
            reason: "no such page".to_string(),
        })?;
        let width = (size.width * scale).round().max(1.0) as u32;
        let height = (size.height * scale).round().max(1.0) as u32;
        RasterImage::from_rgba(page, &RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
    }
}

/// Conversion service stand-in. With a gate, each conversion waits until the
/// gate is notified.
#[derive(Debug, Clone)]
pub struct FakeConverter {
    pub url: String,
    pub pdf: Vec<u8>,
    pub gate: Option<Arc<Notify>>,
    pub conversions: Arc<AtomicUsize>,
}

impl FakeConverter {
    pub fn new(url: &str, pdf: Vec<u8>) -> Self {
        Self {
            url: url.to_string(),
            pdf,
            gate: None,
            conversions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn gated(url: &str, pdf: Vec<u8>) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let converter = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new(url, pdf)
        };
        (converter, gate)
    }

    pub fn conversions(&self) -> usize {
        self.conversions.load(Ordering::SeqCst)
    }
}

impl RemoteConverter for FakeConverter {
    fn convert<'a>(&'a self, _name: &'a str, _bytes: Arc<[u8]>) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.conversions.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(self.url.clone())
        })
    }

    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<[u8]>>> {
        Box::pin(async move {
            if url == self.url {
                Ok(self.pdf.clone().into())
            } else {
                Err(PreviewError::RemoteConversionFailed(format!("unknown url {}", url)))
            }
        })
    }
}
