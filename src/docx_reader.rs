use std::io::Cursor;

use docx_rust::DocxFile;

use crate::docx_html;
use crate::error::{PreviewError, Result};
use crate::reader::{DocumentReader, PreviewResult};

/// Word-processor documents rendered to an HTML fragment.
#[derive(Debug, Default)]
pub struct DocxReader;

impl DocumentReader for DocxReader {
    fn read(&self, bytes: &[u8]) -> Result<PreviewResult> {
        docx_bytes_to_html(bytes).map(PreviewResult::HtmlFragment)
    }
}

/// Convert raw DOCX bytes straight to markup. Legacy binary `.doc` files are
/// not zip packages and fail as invalid containers.
pub fn docx_bytes_to_html(bytes: &[u8]) -> Result<String> {
    // DocxFile owns the raw parts; the parsed Docx borrows from it.
    let file = DocxFile::from_reader(Cursor::new(bytes))
        .map_err(|e| PreviewError::InvalidContainer(format!("not a DOCX package: {}", e)))?;
    let docx = file
        .parse()
        .map_err(|e| PreviewError::InvalidContainer(format!("failed to parse DOCX content: {}", e)))?;

    let html = docx_html::docx_to_html(&docx);
    tracing::debug!("converted DOCX to {} bytes of HTML", html.len());
    Ok(html)
}
