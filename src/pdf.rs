//! Page geometry and rasterization for PDF documents.
//!
//! Page sizes come from the document's own page tree; pixels come from a
//! [`PageRasterizer`], by default poppler's `pdftoppm`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};

use futures::stream::{self, StreamExt, TryStreamExt};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tempfile::NamedTempFile;

use crate::error::{PreviewError, Result};
use crate::pipeline::RunGuard;
use crate::raster::RasterImage;

/// Scale used for every page of a thumbnail grid.
pub const GRID_SCALE: f32 = 0.5;
/// Scale used for the single full-size viewer.
pub const FULL_SCALE: f32 = 1.0;

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;
/// US Letter, used when a page declares no usable media box.
const DEFAULT_PAGE: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};
/// Pages of one document rendered at the same time.
const MAX_CONCURRENT_PAGES: usize = 4;
/// Guard against cyclic `/Parent` chains.
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// Natural size of a page in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Box a thumbnail must fit inside, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetBox {
    pub width: f32,
    pub height: f32,
}

/// Largest scale at which `natural` still fits inside `target`.
pub fn fit_scale(target: TargetBox, natural: PageSize) -> f32 {
    (target.width / natural.width).min(target.height / natural.height)
}

/// A parsed PDF: its bytes plus every page's natural size, in page order.
#[derive(Debug)]
pub struct PdfDocument {
    bytes: Arc<[u8]>,
    pages: Vec<PageSize>,
    /// Copy on disk for external renderers, written on first use.
    on_disk: OnceLock<NamedTempFile>,
}

impl PdfDocument {
    pub fn parse(bytes: Arc<[u8]>) -> Result<Self> {
        let document = Document::load_mem(&bytes)
            .map_err(|e| PreviewError::InvalidContainer(format!("not a readable PDF: {}", e)))?;

        let pages = document
            .get_pages()
            .values()
            .map(|&id| page_size(&document, id))
            .collect::<Vec<_>>();
        tracing::debug!("parsed PDF with {} pages", pages.len());

        Ok(Self {
            bytes,
            pages,
            on_disk: OnceLock::new(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Path of a temporary file holding the document, written once and shared
    /// by every page render. Removed when the document is dropped.
    pub fn on_disk(&self) -> std::io::Result<&Path> {
        if let Some(file) = self.on_disk.get() {
            return Ok(file.path());
        }

        let mut file = tempfile::Builder::new().prefix("docpreview-").suffix(".pdf").tempfile()?;
        file.write_all(&self.bytes)?;
        file.flush()?;
        // A concurrent first use may win; its copy is kept and ours dropped.
        let _ = self.on_disk.set(file);
        self.on_disk
            .get()
            .map(NamedTempFile::path)
            .ok_or_else(|| std::io::Error::other("temporary copy disappeared"))
    }

    /// Size of the 1-based `page`.
    pub fn page_size(&self, page: u32) -> Option<PageSize> {
        let index = page.checked_sub(1)? as usize;
        self.pages.get(index).copied()
    }
}

fn page_size(document: &Document, page: ObjectId) -> PageSize {
    let Some(media_box) = inherited(document, page, b"MediaBox").and_then(|o| rect(document, o)) else {
        tracing::debug!("page {:?} has no usable MediaBox, assuming Letter", page);
        return DEFAULT_PAGE;
    };

    let rotation = inherited(document, page, b"Rotate")
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0);
    if rotation.rem_euclid(180) == 90 {
        PageSize {
            width: media_box.height,
            height: media_box.width,
        }
    } else {
        media_box
    }
}

/// Look `key` up on the page, then on its ancestors in the page tree.
fn inherited<'a>(document: &'a Document, page: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node: &Dictionary = document.get_dictionary(page).ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = document.get_dictionary(parent).ok()?;
    }
    None
}

fn rect(document: &Document, object: &Object) -> Option<PageSize> {
    let object = match object {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };
    let values = object
        .as_array()
        .ok()?
        .iter()
        .map(|v| v.as_float().ok())
        .collect::<Option<Vec<f32>>>()?;
    let &[x0, y0, x1, y1] = values.as_slice() else {
        return None;
    };
    let size = PageSize {
        width: (x1 - x0).abs(),
        height: (y1 - y0).abs(),
    };
    (size.width > 0.0 && size.height > 0.0).then_some(size)
}

/// Renders one page of a parsed PDF into pixels.
///
/// Implementations block; callers run them on the blocking pool.
pub trait PageRasterizer: Send + Sync {
    fn render_page(&self, document: &PdfDocument, page: u32, scale: f32) -> Result<RasterImage>;
}

/// Rasterizer backed by poppler's `pdftoppm` command.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn render_page(&self, document: &PdfDocument, page: u32, scale: f32) -> Result<RasterImage> {
        let failed = |reason: String| PreviewError::RasterizationFailed { page, reason };

        let input = document.on_disk().map_err(|e| failed(e.to_string()))?;
        let workdir = tempfile::tempdir().map_err(|e| failed(e.to_string()))?;
        let output_root = workdir.path().join("page");

        let page_arg = page.to_string();
        let dpi = format!("{:.3}", POINTS_PER_INCH * scale);
        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-singlefile")
            .args(["-f", page_arg.as_str(), "-l", page_arg.as_str()])
            .args(["-r", dpi.as_str()])
            .arg(input)
            .arg(&output_root)
            .output()
            .map_err(|e| failed(format!("could not run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let png = fs::read(output_root.with_extension("png")).map_err(|e| failed(e.to_string()))?;
        RasterImage::from_png(page, png)
    }
}

/// Render every page at `scale`, returning images in page order.
///
/// At most [`MAX_CONCURRENT_PAGES`] pages render at once. The batch is
/// all-or-nothing: the first failing page (in page order) fails the whole
/// call.
pub async fn render_all(
    rasterizer: Arc<dyn PageRasterizer>,
    document: Arc<PdfDocument>,
    scale: f32,
    guard: &RunGuard,
) -> Result<Vec<RasterImage>> {
    let images: Vec<RasterImage> = stream::iter(1..=document.page_count())
        .map(|page| render_one(Arc::clone(&rasterizer), Arc::clone(&document), page, scale, guard))
        .buffered(MAX_CONCURRENT_PAGES)
        .try_collect()
        .await?;

    tracing::debug!("rendered {} pages at scale {}", images.len(), scale);
    Ok(images)
}

async fn render_one(
    rasterizer: Arc<dyn PageRasterizer>,
    document: Arc<PdfDocument>,
    page: u32,
    scale: f32,
    guard: &RunGuard,
) -> Result<RasterImage> {
    guard.check()?;
    tokio::task::spawn_blocking(move || rasterizer.render_page(&document, page, scale))
        .await
        .map_err(|e| PreviewError::RasterizationFailed {
            page,
            reason: e.to_string(),
        })?
}

/// Render page 1 scaled to fit inside `target`.
pub async fn render_first_page(
    rasterizer: Arc<dyn PageRasterizer>,
    document: Arc<PdfDocument>,
    target: TargetBox,
) -> Result<RasterImage> {
    let natural = document
        .page_size(1)
        .ok_or_else(|| PreviewError::RasterizationFailed {
            page: 1,
            reason: "document has no pages".to_string(),
        })?;
    let scale = fit_scale(target, natural);

    tokio::task::spawn_blocking(move || rasterizer.render_page(&document, 1, scale))
        .await
        .map_err(|e| PreviewError::RasterizationFailed {
            page: 1,
            reason: e.to_string(),
        })?
}
