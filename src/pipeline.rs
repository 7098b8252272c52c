//! One decode run per (document, settings) pair.
//!
//! A run loads the document's bytes, hands them to the strategy its
//! [`FormatKind`] selects, rasterizes when the format is paged, and returns a
//! single [`PreviewResult`]. Failures come back as `PreviewResult::Error`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::docx_reader::DocxReader;
use crate::document::DocumentSnapshot;
use crate::error::{PreviewError, Result};
use crate::format::FormatKind;
use crate::loader;
use crate::pdf::{self, PageRasterizer, PdfDocument, FULL_SCALE, GRID_SCALE};
use crate::reader::{DocumentReader, PreviewResult};
use crate::remote::RemoteConverter;
use crate::settings::{Orientation, PresentationMode, Settings};
use crate::sheet_reader::{SheetReader, THUMBNAIL_ROWS};
use crate::slides_reader::SlideTextReader;

/// Identifies one run and tells whether a newer run has replaced it.
#[derive(Debug, Clone)]
pub struct RunGuard {
    token: u64,
    current: Arc<AtomicU64>,
}

impl RunGuard {
    pub fn new(token: u64, current: Arc<AtomicU64>) -> Self {
        Self { token, current }
    }

    /// A guard not tied to any controller; current until superseded.
    pub fn detached() -> Self {
        Self::new(0, Arc::new(AtomicU64::new(0)))
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.token
    }

    /// Fails with [`PreviewError::Cancelled`] once superseded.
    pub fn check(&self) -> Result<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(PreviewError::Cancelled)
        }
    }

    /// Mark this run as replaced.
    pub fn supersede(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

/// Everything a finished run hands back to its owner.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub result: PreviewResult,
    /// URL produced by the conversion service during this run, if any.
    pub converted_url: Option<String>,
}

/// Shared, stateless decode machinery.
pub struct Pipeline {
    rasterizer: Arc<dyn PageRasterizer>,
    converter: Option<Arc<dyn RemoteConverter>>,
}

impl Pipeline {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            rasterizer,
            converter: None,
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn RemoteConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Whether presentations are previewed remotely under `settings`.
    pub fn presents_remotely(&self, settings: &Settings) -> bool {
        settings.presentation_mode == PresentationMode::Remote && self.converter.is_some()
    }

    /// Run the full preview pipeline for `document`.
    ///
    /// `cached_url` is a conversion already produced for this document; when
    /// present the conversion service is not called again.
    pub async fn run(
        &self,
        document: &DocumentSnapshot,
        settings: &Settings,
        cached_url: Option<String>,
        guard: &RunGuard,
    ) -> RunOutput {
        tracing::debug!(
            "run {} for {} ({})",
            guard.token(),
            document.name,
            document.kind.label()
        );
        let mut converted_url = None;

        let result = match document.kind {
            FormatKind::Pdf => self.pdf_pages(document, settings, guard).await,
            FormatKind::WordMarkup => self.decode_with(document, DocxReader, guard).await,
            FormatKind::Spreadsheet => self.decode_with(document, SheetReader, guard).await,
            FormatKind::Presentation if self.presents_remotely(settings) => {
                self.remote_presentation(document, settings, cached_url, &mut converted_url, guard)
                    .await
            }
            FormatKind::Presentation => {
                if settings.presentation_mode == PresentationMode::Remote {
                    tracing::warn!("no conversion service configured; extracting slide text instead");
                }
                self.decode_with(document, SlideTextReader, guard).await
            }
            FormatKind::Image => Ok(PreviewResult::ImageRef(document.display_url.clone())),
            FormatKind::Unknown => Err(PreviewError::UnsupportedFormat(document.name.clone())),
        };

        if let Err(ref e) = result {
            tracing::debug!("run {} for {} failed: {}", guard.token(), document.name, e);
        }
        RunOutput {
            result: result.into(),
            converted_url,
        }
    }

    /// Small preview for the file list, independent of any session.
    pub async fn thumbnail(&self, document: &DocumentSnapshot, orientation: Orientation) -> PreviewResult {
        let guard = RunGuard::detached();
        let result = match document.kind {
            FormatKind::Pdf => self.first_page(document, orientation, &guard).await,
            FormatKind::Spreadsheet => self
                .decode_with(document, SheetReader, &guard)
                .await
                .map(|result| match result {
                    PreviewResult::Table(mut rows) => {
                        rows.truncate(THUMBNAIL_ROWS);
                        PreviewResult::Table(rows)
                    }
                    other => other,
                }),
            FormatKind::WordMarkup => self.decode_with(document, DocxReader, &guard).await,
            FormatKind::Presentation => self
                .decode_with(document, SlideTextReader, &guard)
                .await
                .map(|result| match result {
                    PreviewResult::SlideTexts(mut texts) => {
                        texts.truncate(1);
                        PreviewResult::SlideTexts(texts)
                    }
                    other => other,
                }),
            FormatKind::Image => Ok(PreviewResult::ImageRef(document.display_url.clone())),
            FormatKind::Unknown => Err(PreviewError::UnsupportedFormat(document.name.clone())),
        };
        result.into()
    }

    async fn decode_with<R>(&self, document: &DocumentSnapshot, reader: R, guard: &RunGuard) -> Result<PreviewResult>
    where
        R: DocumentReader + 'static,
    {
        guard.check()?;
        let bytes = loader::load_bytes(&document.source).await?;
        guard.check()?;
        blocking(move || reader.read(&bytes)).await
    }

    async fn pdf_pages(&self, document: &DocumentSnapshot, settings: &Settings, guard: &RunGuard) -> Result<PreviewResult> {
        guard.check()?;
        let bytes = loader::load_bytes(&document.source).await?;
        self.render_pdf(bytes, settings, guard).await
    }

    async fn render_pdf(&self, bytes: Arc<[u8]>, settings: &Settings, guard: &RunGuard) -> Result<PreviewResult> {
        let parsed = Arc::new(blocking(move || PdfDocument::parse(bytes)).await?);
        let scale = if settings.grouped() { GRID_SCALE } else { FULL_SCALE };
        let images = pdf::render_all(Arc::clone(&self.rasterizer), parsed, scale, guard).await?;
        Ok(PreviewResult::PageImages(images))
    }

    async fn first_page(&self, document: &DocumentSnapshot, orientation: Orientation, guard: &RunGuard) -> Result<PreviewResult> {
        guard.check()?;
        let bytes = loader::load_bytes(&document.source).await?;
        let parsed = Arc::new(blocking(move || PdfDocument::parse(bytes)).await?);
        let image = pdf::render_first_page(Arc::clone(&self.rasterizer), parsed, orientation.thumbnail_box()).await?;
        Ok(PreviewResult::PageImages(vec![image]))
    }

    async fn remote_presentation(
        &self,
        document: &DocumentSnapshot,
        settings: &Settings,
        cached_url: Option<String>,
        converted_url: &mut Option<String>,
        guard: &RunGuard,
    ) -> Result<PreviewResult> {
        let Some(converter) = self.converter.as_ref() else {
            return Err(PreviewError::RemoteConversionFailed(
                "no conversion service configured".to_string(),
            ));
        };

        let url = match cached_url {
            Some(url) => url,
            None => {
                guard.check()?;
                let bytes = loader::load_bytes(&document.source).await?;
                guard.check()?;
                let url = converter.convert(&document.name, bytes).await?;
                *converted_url = Some(url.clone());
                url
            }
        };

        if !settings.grouped() {
            return Ok(PreviewResult::RemoteDocumentRef(url));
        }

        guard.check()?;
        let bytes = converter.fetch(&url).await?;
        self.render_pdf(bytes, settings, guard).await
    }
}

/// Run CPU-bound decoding on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PreviewError::UnreadableSource(format!("decoder task failed: {}", e)))?
}
