use quick_xml::events::Event;
use quick_xml::Reader;

use crate::archive::{Part, PartReader, ZipPartReader};
use crate::error::{PreviewError, Result};
use crate::reader::{DocumentReader, PreviewResult};

/// Folder holding one XML part per slide.
pub const SLIDE_FOLDER: &str = "ppt/slides";
const SLIDE_EXTENSION: &str = ".xml";
/// Local name of a DrawingML text run.
const TEXT_RUN: &[u8] = b"t";

/// Text-only presentation preview: one string per slide.
#[derive(Debug, Default)]
pub struct SlideTextReader;

impl DocumentReader for SlideTextReader {
    fn read(&self, bytes: &[u8]) -> Result<PreviewResult> {
        extract_slide_texts(bytes).map(PreviewResult::SlideTexts)
    }
}

/// Extract each slide's text, in slide order.
///
/// A slide that cannot be decoded keeps its position with an empty string.
/// Only a broken archive or a missing slide folder fails the whole call.
pub fn extract_slide_texts(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = ZipPartReader::from_bytes(bytes)?;
    let parts = archive.parts_in(SLIDE_FOLDER, SLIDE_EXTENSION)?;
    tracing::debug!("found {} slide parts", parts.len());

    Ok(parts.iter().map(slide_text_or_empty).collect())
}

fn slide_text_or_empty(part: &Part) -> String {
    match part_text(part) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("{}; showing the slide without text", e);
            String::new()
        }
    }
}

fn part_text(part: &Part) -> Result<String> {
    let xml = std::str::from_utf8(&part.bytes).map_err(|e| PreviewError::MalformedPart {
        name: part.name.clone(),
        reason: e.to_string(),
    })?;
    slide_text(xml).map_err(|reason| PreviewError::MalformedPart {
        name: part.name.clone(),
        reason,
    })
}

/// Concatenate the content of every text-run element, namespace prefix
/// ignored, separated by single spaces and trimmed.
pub fn slide_text(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);

    let mut runs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut run_depth = 0usize;
    let mut open: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                open.push(e.name().as_ref().to_vec());
                if e.local_name().as_ref() == TEXT_RUN {
                    run_depth += 1;
                }
            }
            Ok(Event::End(e)) => {
                match open.pop() {
                    Some(name) if name == e.name().as_ref() => {}
                    _ => {
                        return Err(format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        ))
                    }
                }
                if e.local_name().as_ref() == TEXT_RUN && run_depth > 0 {
                    run_depth -= 1;
                    if run_depth == 0 {
                        runs.push(std::mem::take(&mut current));
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == TEXT_RUN && run_depth == 0 {
                    runs.push(String::new());
                }
            }
            Ok(Event::Text(t)) if run_depth > 0 => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                current.push_str(&text);
            }
            Ok(Event::CData(c)) if run_depth > 0 => {
                current.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "invalid XML at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
        }
    }

    if !open.is_empty() {
        return Err("unexpected end of document".to_string());
    }

    Ok(runs.join(" ").trim().to_string())
}
