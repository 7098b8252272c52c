//! Document preview and thumbnail rendering for PDF, word-processor,
//! spreadsheet, presentation and image files.

pub mod archive;
pub mod controller;
pub mod document;
pub mod docx_html;
pub mod docx_reader;
pub mod error;
pub mod format;
pub mod html;
pub mod loader;
pub mod natural;
pub mod paginate;
pub mod pdf;
pub mod pipeline;
pub mod raster;
pub mod reader;
pub mod remote;
pub mod settings;
pub mod sheet_reader;
pub mod slides_reader;

#[cfg(test)]
mod fixtures;

pub use controller::{PreviewController, SessionState};
pub use document::{ByteSource, DocumentHandle, DocumentId};
pub use error::{PreviewError, Result};
pub use format::FormatKind;
pub use pipeline::Pipeline;
pub use reader::PreviewResult;
pub use settings::Settings;
