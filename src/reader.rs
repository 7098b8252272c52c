use std::fmt;

use serde::Serialize;

use crate::error::{PreviewError, Result};
use crate::raster::RasterImage;

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A formula error such as `#DIV/0!`.
    Error(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) | CellValue::Error(s) => f.write_str(s),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

/// Shared representation of a finished decode, across all formats.
///
/// Produced once per pipeline run and replaced wholesale by the next run.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewResult {
    HtmlFragment(String),
    /// Row-major grid of the first sheet; row 0 is not treated specially.
    Table(Vec<Vec<CellValue>>),
    /// One entry per slide, in slide order, empty when a slide has no text.
    SlideTexts(Vec<String>),
    PageImages(Vec<RasterImage>),
    RemoteDocumentRef(String),
    ImageRef(String),
    Error(PreviewError),
}

impl PreviewResult {
    pub fn variant_name(&self) -> &'static str {
        match self {
            PreviewResult::HtmlFragment(_) => "html",
            PreviewResult::Table(_) => "table",
            PreviewResult::SlideTexts(_) => "slides",
            PreviewResult::PageImages(_) => "pages",
            PreviewResult::RemoteDocumentRef(_) => "remote",
            PreviewResult::ImageRef(_) => "image",
            PreviewResult::Error(_) => "error",
        }
    }
}

impl From<Result<PreviewResult>> for PreviewResult {
    fn from(result: Result<PreviewResult>) -> Self {
        result.unwrap_or_else(PreviewResult::Error)
    }
}

/// A format strategy that decodes a document's complete bytes.
///
/// Implementations are synchronous and CPU-bound; the pipeline runs them off
/// the async executor.
pub trait DocumentReader: Send + Sync {
    fn read(&self, bytes: &[u8]) -> Result<PreviewResult>;
}
