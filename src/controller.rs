//! Preview lifecycle: owns the file list, the selection and the single visible
//! preview session.
//!
//! Every selection change, file-set change, or relevant settings change starts
//! a new pipeline run tagged with a fresh token. Runs report back over a
//! channel; a completion is applied only if its token is still the newest one,
//! so a slow run for an earlier selection can never overwrite a later one.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::document::{ByteSource, DocumentHandle, DocumentId, UrlRegistry};
use crate::error::PreviewError;
use crate::paginate::{self, GridLayout};
use crate::pipeline::{Pipeline, RunGuard, RunOutput};
use crate::raster::RasterImage;
use crate::reader::PreviewResult;
use crate::settings::Settings;

/// State of the visible preview.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready(PreviewResult),
    Error(PreviewError),
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

impl From<PreviewResult> for SessionState {
    fn from(result: PreviewResult) -> Self {
        match result {
            PreviewResult::Error(e) => SessionState::Error(e),
            other => SessionState::Ready(other),
        }
    }
}

#[derive(Debug)]
struct Completion {
    token: u64,
    document: DocumentId,
    output: RunOutput,
}

pub struct PreviewController {
    pipeline: Arc<Pipeline>,
    registry: UrlRegistry,
    documents: Vec<DocumentHandle>,
    next_id: u64,
    selected: Option<usize>,
    settings: Settings,
    session: SessionState,
    generation: Arc<AtomicU64>,
    /// Conversion-service URLs, produced at most once per document.
    remote_urls: HashMap<DocumentId, String>,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
}

impl PreviewController {
    /// Runs are spawned onto the current tokio runtime.
    pub fn new(pipeline: Pipeline, settings: Settings) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            pipeline: Arc::new(pipeline),
            registry: UrlRegistry::new(),
            documents: Vec::new(),
            next_id: 1,
            selected: None,
            settings: settings.with_slides_per_page(settings.slides_per_page),
            session: SessionState::Idle,
            generation: Arc::new(AtomicU64::new(0)),
            remote_urls: HashMap::new(),
            completions_tx,
            completions_rx,
        }
    }

    pub fn documents(&self) -> &[DocumentHandle] {
        &self.documents
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_document(&self) -> Option<&DocumentHandle> {
        self.selected.and_then(|i| self.documents.get(i))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn registry(&self) -> &UrlRegistry {
        &self.registry
    }

    pub fn remote_url(&self, id: DocumentId) -> Option<&str> {
        self.remote_urls.get(&id).map(String::as_str)
    }

    /// Add a document and select it.
    pub fn add_document(&mut self, name: impl Into<String>, source: ByteSource) -> DocumentId {
        let id = DocumentId(self.next_id);
        self.next_id += 1;

        let handle = DocumentHandle::new(id, name, source, &self.registry);
        tracing::info!("added {} {} ({})", id, handle.name(), handle.kind().label());
        self.documents.push(handle);
        self.selected = Some(self.documents.len() - 1);
        self.trigger();
        id
    }

    /// Add a file from disk, named after its file name.
    pub fn add_path(&mut self, path: &Path) -> DocumentId {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.add_document(name, ByteSource::File(path.to_path_buf()))
    }

    /// Remove the document at `index`, releasing its display URL. Returns
    /// false when there is no such document.
    pub fn remove_document(&mut self, index: usize) -> bool {
        if index >= self.documents.len() {
            return false;
        }

        let handle = self.documents.remove(index);
        self.remote_urls.remove(&handle.id());
        tracing::info!("removed {} {}", handle.id(), handle.name());
        drop(handle);

        self.selected = match self.selected {
            _ if self.documents.is_empty() => None,
            Some(current) if current == index => Some(0),
            Some(current) if current > index => Some(current - 1),
            other => other,
        };
        self.trigger();
        true
    }

    /// Select the document at `index`. Returns false when out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.documents.len() {
            return false;
        }
        if self.selected != Some(index) {
            self.selected = Some(index);
            self.trigger();
        }
        true
    }

    /// Replace the settings, re-running the preview only when the active
    /// document's strategy depends on what changed.
    pub fn update_settings(&mut self, next: Settings) {
        let next = next.with_slides_per_page(next.slides_per_page);
        let rerun = self.selected_document().is_some_and(|doc| {
            let remote = self.pipeline.presents_remotely(&self.settings);
            self.settings.invalidates(&next, doc.kind(), remote)
        });

        self.settings = next;
        if rerun {
            tracing::debug!("settings change invalidates the current preview");
            self.trigger();
        }
    }

    /// Start a run for the current selection, superseding any run in flight.
    fn trigger(&mut self) {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(document) = self.selected_document() else {
            self.session = SessionState::Idle;
            return;
        };

        let snapshot = document.snapshot();
        let cached_url = self.remote_urls.get(&snapshot.id).cloned();
        let settings = self.settings;
        let guard = RunGuard::new(token, Arc::clone(&self.generation));
        let pipeline = Arc::clone(&self.pipeline);
        let completions = self.completions_tx.clone();

        self.session = SessionState::Loading;
        tokio::spawn(async move {
            let output = pipeline.run(&snapshot, &settings, cached_url, &guard).await;
            // The receiver only goes away with the controller.
            let _ = completions.send(Completion {
                token,
                document: snapshot.id,
                output,
            });
        });
    }

    /// Apply one finished run. Returns whether it became the visible state.
    fn apply(&mut self, completion: Completion) -> bool {
        let Completion {
            token,
            document,
            output,
        } = completion;

        if let Some(url) = output.converted_url {
            if self.documents.iter().any(|d| d.id() == document) {
                self.remote_urls.entry(document).or_insert(url);
            }
        }

        if token != self.generation.load(Ordering::SeqCst) {
            tracing::debug!("discarding stale result for {} (run {})", document, token);
            return false;
        }

        tracing::debug!("run {} for {} finished: {}", token, document, output.result.variant_name());
        self.session = SessionState::from(output.result);
        true
    }

    /// Wait for the next finished run and apply it. Returns `Some(applied)`.
    pub async fn settle_next(&mut self) -> Option<bool> {
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Wait until the current run has been applied.
    pub async fn wait_ready(&mut self) -> &SessionState {
        while self.session.is_loading() {
            if self.settle_next().await.is_none() {
                break;
            }
        }
        &self.session
    }

    /// Page images of the current session laid out for the configured batch
    /// size.
    pub fn thumbnail_layout(&self) -> Option<GridLayout<RasterImage>> {
        match &self.session {
            SessionState::Ready(PreviewResult::PageImages(images)) => {
                Some(paginate::layout(images, self.settings.slides_per_page))
            }
            _ => None,
        }
    }

    /// Small preview of the document at `index` for the file list.
    pub async fn thumbnail(&self, index: usize) -> Option<PreviewResult> {
        let snapshot = self.documents.get(index)?.snapshot();
        Some(self.pipeline.thumbnail(&snapshot, self.settings.orientation).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FakeConverter, SolidRasterizer};
    use crate::reader::CellValue;
    use crate::settings::{ColorMode, PresentationMode};
    use pretty_assertions::assert_eq;

    fn controller() -> PreviewController {
        PreviewController::new(Pipeline::new(Arc::new(SolidRasterizer::default())), Settings::default())
    }

    fn remote_settings() -> Settings {
        Settings {
            presentation_mode: PresentationMode::Remote,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn adding_selects_and_previews() {
        let mut controller = controller();
        assert_eq!(controller.session(), &SessionState::Idle);

        controller.add_document("a.xlsx", fixtures::xlsx(&[&["x"]]).into());
        controller.add_document("b.xlsx", fixtures::xlsx(&[&["Name", "Qty"]]).into());
        assert_eq!(controller.selected_index(), Some(1));
        assert!(controller.session().is_loading());

        let state = controller.wait_ready().await;
        assert_eq!(
            state,
            &SessionState::Ready(PreviewResult::Table(vec![vec![
                CellValue::Text("Name".to_string()),
                CellValue::Text("Qty".to_string()),
            ]]))
        );
    }

    #[tokio::test]
    async fn late_result_for_previous_selection_is_discarded() {
        let (converter, gate) = FakeConverter::gated("https://cdn.example/a.pdf", fixtures::pdf(&[(10, 10)]));
        let pipeline = Pipeline::new(Arc::new(SolidRasterizer::default())).with_converter(Arc::new(converter.clone()));
        let mut controller = PreviewController::new(pipeline, remote_settings());

        let a = controller.add_document("a.pptx", b"deck".to_vec().into());
        while converter.conversions() == 0 {
            tokio::task::yield_now().await;
        }

        controller.add_document("b.png", vec![0x89, b'P', b'N', b'G'].into());
        let b_url = controller.documents()[1].display_url().to_string();
        assert_eq!(controller.wait_ready().await, &SessionState::Ready(PreviewResult::ImageRef(b_url.clone())));

        gate.notify_one();
        assert_eq!(controller.settle_next().await, Some(false));
        assert_eq!(controller.session(), &SessionState::Ready(PreviewResult::ImageRef(b_url)));
        assert_eq!(controller.remote_url(a), Some("https://cdn.example/a.pdf"));

        controller.select(0);
        assert_eq!(
            controller.wait_ready().await,
            &SessionState::Ready(PreviewResult::RemoteDocumentRef("https://cdn.example/a.pdf".to_string()))
        );
        assert_eq!(converter.conversions(), 1);
    }

    #[tokio::test]
    async fn batch_size_change_rerenders_remote_presentation() {
        let converter = FakeConverter::new("https://cdn.example/deck.pdf", fixtures::pdf(&[(40, 30), (40, 30)]));
        let pipeline = Pipeline::new(Arc::new(SolidRasterizer::default())).with_converter(Arc::new(converter.clone()));
        let mut controller = PreviewController::new(pipeline, remote_settings());

        controller.add_document("deck.pptx", b"deck".to_vec().into());
        assert!(matches!(
            controller.wait_ready().await,
            SessionState::Ready(PreviewResult::RemoteDocumentRef(_))
        ));

        controller.update_settings(remote_settings().with_slides_per_page(4));
        assert!(controller.session().is_loading());
        controller.wait_ready().await;

        let Some(GridLayout::Grid(sheets)) = controller.thumbnail_layout() else {
            panic!("expected a thumbnail grid, got {:?}", controller.session());
        };
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].columns, 2);
        assert_eq!((sheets[0].items[0].width, sheets[0].items[0].height), (20, 15));
        assert_eq!(converter.conversions(), 1);
    }

    #[tokio::test]
    async fn display_only_settings_do_not_rerun() {
        let mut controller = controller();
        controller.add_document("notes.xlsx", fixtures::xlsx(&[&["1"]]).into());
        controller.wait_ready().await;

        controller.update_settings(Settings {
            color_mode: ColorMode::BlackAndWhite,
            ..Settings::default().with_slides_per_page(6)
        });
        assert!(matches!(controller.session(), SessionState::Ready(PreviewResult::Table(_))));
        assert_eq!(controller.settings().slides_per_page, 6);
    }

    #[tokio::test]
    async fn pdf_grid_layout() {
        let mut controller = controller();
        controller.update_settings(Settings::default().with_slides_per_page(4));
        controller.add_document("nine.pdf", fixtures::pdf(&[(100, 100); 9]).into());
        controller.wait_ready().await;

        let Some(GridLayout::Grid(sheets)) = controller.thumbnail_layout() else {
            panic!("expected a grid");
        };
        let sizes: Vec<usize> = sheets.iter().map(|s| s.items.len()).collect();
        assert_eq!(sizes, vec![4, 4, 1]);

        controller.update_settings(Settings::default());
        controller.wait_ready().await;
        let Some(GridLayout::FullSize(pages)) = controller.thumbnail_layout() else {
            panic!("expected full size pages");
        };
        assert_eq!(pages.len(), 9);
        assert_eq!(pages[0].width, 100);
    }

    #[tokio::test]
    async fn removal_releases_urls_and_resets_selection() {
        let mut controller = controller();
        controller.add_document("a.png", vec![1].into());
        controller.add_document("b.png", vec![2].into());
        controller.add_document("c.png", vec![3].into());
        controller.wait_ready().await;
        assert_eq!(controller.registry().live(), 3);

        assert!(controller.remove_document(2));
        assert_eq!(controller.selected_index(), Some(0));
        assert_eq!(controller.registry().live(), 2);
        let first_url = controller.documents()[0].display_url().to_string();
        assert_eq!(controller.wait_ready().await, &SessionState::Ready(PreviewResult::ImageRef(first_url)));

        assert!(controller.remove_document(0));
        assert!(controller.remove_document(0));
        assert!(!controller.remove_document(0));
        assert_eq!(controller.selected_index(), None);
        assert_eq!(controller.session(), &SessionState::Idle);
        assert_eq!(controller.registry().live(), 0);
    }

    #[tokio::test]
    async fn failures_become_error_state() {
        let mut controller = controller();
        controller.add_document("Makefile", vec![0; 4].into());

        let SessionState::Error(err) = controller.wait_ready().await.clone() else {
            panic!("expected an error state");
        };
        assert_eq!(err, PreviewError::UnsupportedFormat("Makefile".to_string()));
        assert!(err.user_message().contains("UnsupportedFormat"));
    }

    #[tokio::test]
    async fn thumbnails_follow_orientation() {
        let mut controller = controller();
        controller.update_settings(Settings {
            orientation: crate::settings::Orientation::Landscape,
            ..Settings::default()
        });
        controller.add_document("wide.pdf", fixtures::pdf(&[(800, 600)]).into());

        let Some(PreviewResult::PageImages(images)) = controller.thumbnail(0).await else {
            panic!("expected a page image");
        };
        assert_eq!((images[0].width, images[0].height), (160, 120));
        assert_eq!(controller.thumbnail(5).await, None);
    }
}
