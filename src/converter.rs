use crate::cli::Cli;
use anyhow::{Context, Result};
use docpreview::controller::{PreviewController, SessionState};
use docpreview::document::DocumentHandle;
use docpreview::format;
use docpreview::html;
use docpreview::loader;
use docpreview::paginate::GridLayout;
use docpreview::pdf::PdftoppmRasterizer;
use docpreview::raster::RasterImage;
use docpreview::reader::PreviewResult;
use docpreview::remote::ConversionClient;
use docpreview::settings::{ColorMode, Settings};
use docpreview::sheet_reader::THUMBNAIL_ROWS;
use docpreview::Pipeline;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct RenderedDocument {
    name: String,
    kind: &'static str,
    dirname: String,
    status: String,
}

pub async fn convert(cli: &Cli) -> Result<()> {
    let settings = cli.settings();
    let output_dir = cli.output.clone().unwrap_or_else(|| PathBuf::from("preview"));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let mut pipeline = Pipeline::new(Arc::new(PdftoppmRasterizer::new(&cli.pdftoppm)));
    if let Some(ref endpoint) = cli.converter_url {
        let client = ConversionClient::new(endpoint.clone()).context("Failed to set up the conversion client")?;
        pipeline = pipeline.with_converter(Arc::new(client));
    }
    let mut controller = PreviewController::new(pipeline, settings);

    let mut rendered = Vec::new();
    for input in &cli.inputs {
        controller.add_path(input);
        let state = controller.wait_ready().await.clone();

        let index = controller.documents().len() - 1;
        let document = &controller.documents()[index];
        let dirname = format!("{:02}-{}", index + 1, slug(document.name()));
        let doc_dir = output_dir.join(&dirname);
        fs::create_dir_all(&doc_dir)?;

        let body = render_state(&controller, document, &state, &doc_dir).await?;
        let preview = html::page(document.name(), &body);
        fs::write(doc_dir.join("preview.html"), preview)
            .with_context(|| format!("Failed to write preview for {}", document.name()))?;

        if !cli.no_thumbnails {
            if let Some(thumbnail) = controller.thumbnail(index).await {
                write_thumbnail(&thumbnail, &doc_dir, &settings)?;
            }
        }

        rendered.push(RenderedDocument {
            name: document.name().to_string(),
            kind: document.kind().label(),
            dirname,
            status: status_line(&state),
        });
    }

    write_index(&output_dir, &rendered)?;

    let failed = rendered.iter().filter(|d| d.status.starts_with("Preview unavailable")).count();
    eprintln!(
        "Previewed {} documents{} to {}",
        rendered.len(),
        if failed > 0 {
            format!(" ({} failed)", failed)
        } else {
            String::new()
        },
        output_dir.display()
    );

    Ok(())
}

/// Preview body for one document; writes any page images next to it.
async fn render_state(
    controller: &PreviewController,
    document: &DocumentHandle,
    state: &SessionState,
    doc_dir: &Path,
) -> Result<String> {
    let result = match state {
        SessionState::Ready(result) => result,
        SessionState::Error(e) => return Ok(error_markup(&e.user_message())),
        SessionState::Idle | SessionState::Loading => return Ok("<p>No preview available.</p>\n".to_string()),
    };

    let greyscale = controller.settings().color_mode == ColorMode::BlackAndWhite;
    let body = match result {
        PreviewResult::HtmlFragment(fragment) => fragment.clone(),
        PreviewResult::Table(rows) => html::table(rows, None),
        PreviewResult::SlideTexts(texts) => html::slides(texts),
        PreviewResult::PageImages(images) => {
            for image in images {
                let path = doc_dir.join(page_filename(image));
                image
                    .save(&path, greyscale)
                    .with_context(|| format!("Failed to write page image: {}", path.display()))?;
            }
            match controller.thumbnail_layout() {
                Some(layout) => page_layout(&layout),
                None => String::new(),
            }
        }
        PreviewResult::RemoteDocumentRef(url) => format!(
            "<iframe src=\"{}\" width=\"100%\" height=\"800\" title=\"{}\"></iframe>\n",
            html::escape(url),
            html::escape(document.name())
        ),
        PreviewResult::ImageRef(url) => {
            let source = controller
                .registry()
                .resolve(url)
                .with_context(|| format!("Display URL for {} is no longer live", document.name()))?;
            let bytes = loader::load_bytes(&source).await?;
            let filename = match format::extension(document.name()) {
                Some(ext) => format!("original.{}", ext),
                None => "original".to_string(),
            };
            fs::write(doc_dir.join(&filename), &bytes[..])
                .with_context(|| format!("Failed to copy image: {}", document.name()))?;
            format!(
                "<img src=\"{}\" alt=\"{}\" style=\"max-width:100%\">\n",
                filename,
                html::escape(document.name())
            )
        }
        PreviewResult::Error(e) => error_markup(&e.user_message()),
    };
    Ok(body)
}

fn page_layout(layout: &GridLayout<RasterImage>) -> String {
    let mut out = String::new();
    match layout {
        GridLayout::FullSize(pages) => {
            for page in pages {
                out.push_str(&format!(
                    "<img src=\"{}\" alt=\"Page {}\" style=\"display:block;margin:0 auto 1em\">\n",
                    page_filename(page),
                    page.page
                ));
            }
        }
        GridLayout::Grid(sheets) => {
            for (i, sheet) in sheets.iter().enumerate() {
                out.push_str(&format!(
                    "<section class=\"sheet\"><h2>Sheet {}</h2>\n<div style=\"display:grid;grid-template-columns:repeat({}, 1fr);gap:8px\">\n",
                    i + 1,
                    sheet.columns
                ));
                for page in &sheet.items {
                    out.push_str(&format!(
                        "<img src=\"{}\" alt=\"Page {}\" style=\"width:100%\">\n",
                        page_filename(page),
                        page.page
                    ));
                }
                out.push_str("</div></section>\n");
            }
        }
    }
    out
}

fn write_thumbnail(thumbnail: &PreviewResult, doc_dir: &Path, settings: &Settings) -> Result<()> {
    let fragment = match thumbnail {
        PreviewResult::PageImages(images) => {
            if let Some(first) = images.first() {
                let path = doc_dir.join("thumbnail.png");
                first
                    .save(&path, settings.color_mode == ColorMode::BlackAndWhite)
                    .with_context(|| format!("Failed to write thumbnail: {}", path.display()))?;
            }
            return Ok(());
        }
        PreviewResult::Table(rows) => html::table(rows, Some(THUMBNAIL_ROWS)),
        PreviewResult::HtmlFragment(fragment) => fragment.clone(),
        PreviewResult::SlideTexts(texts) => html::slides(texts),
        // The copied original already serves as its own thumbnail.
        PreviewResult::ImageRef(_) | PreviewResult::RemoteDocumentRef(_) => return Ok(()),
        PreviewResult::Error(e) => {
            tracing::warn!("no thumbnail: {}", e);
            return Ok(());
        }
    };

    let (width, height) = {
        let target = settings.orientation.thumbnail_box();
        (target.width, target.height)
    };
    let body = format!(
        "<div style=\"width:{}px;height:{}px;overflow:hidden;font-size:6px\">\n{}</div>\n",
        width, height, fragment
    );
    fs::write(doc_dir.join("thumbnail.html"), html::page("Thumbnail", &body))
        .with_context(|| format!("Failed to write thumbnail in {}", doc_dir.display()))?;
    Ok(())
}

fn write_index(output_dir: &Path, documents: &[RenderedDocument]) -> Result<()> {
    let mut body = String::from("<h1>Documents</h1>\n<ol>\n");
    for document in documents {
        body.push_str(&format!(
            "<li><a href=\"{}/preview.html\">{}</a> ({}): {}</li>\n",
            document.dirname,
            html::escape(&document.name),
            document.kind,
            html::escape(&document.status)
        ));
    }
    body.push_str("</ol>\n");

    fs::write(output_dir.join("index.html"), html::page("Document previews", &body))
        .with_context(|| "Failed to write index.html")?;
    Ok(())
}

fn status_line(state: &SessionState) -> String {
    match state {
        SessionState::Ready(PreviewResult::PageImages(images)) => format!("{} pages", images.len()),
        SessionState::Ready(PreviewResult::SlideTexts(texts)) => format!("{} slides", texts.len()),
        SessionState::Ready(PreviewResult::Table(rows)) => format!("{} rows", rows.len()),
        SessionState::Ready(PreviewResult::Error(e)) | SessionState::Error(e) => e.user_message(),
        SessionState::Ready(result) => result.variant_name().to_string(),
        SessionState::Idle | SessionState::Loading => "not previewed".to_string(),
    }
}

fn error_markup(message: &str) -> String {
    format!("<p class=\"error\">{}</p>\n", html::escape(message))
}

fn page_filename(image: &RasterImage) -> String {
    format!("page-{:03}.png", image.page)
}

/// File-system friendly directory name derived from a document name.
fn slug(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug.to_string()
    }
}
