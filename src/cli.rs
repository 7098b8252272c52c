use clap::Parser;
use docpreview::settings::{ColorMode, Orientation, PresentationMode, Settings};
use std::path::PathBuf;

/// Render previews and thumbnails for PDF, DOCX, XLSX, PPTX and image files
#[derive(Parser, Debug)]
#[command(name = "docpreview", version, about)]
pub struct Cli {
    /// Documents to preview
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory. Defaults to `preview` in the current directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pages per printed sheet; 1 shows full-size pages
    #[arg(
        long,
        env = "DOCPREVIEW_SLIDES_PER_PAGE",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub slides_per_page: u64,

    #[arg(long, value_enum, default_value_t = Orientation::Portrait)]
    pub orientation: Orientation,

    /// Black-and-white writes greyscale page images
    #[arg(long, value_enum, default_value_t = ColorMode::Color)]
    pub color: ColorMode,

    /// Extract slide text locally, or convert through the conversion service
    #[arg(long, value_enum, default_value_t = PresentationMode::Text)]
    pub presentation: PresentationMode,

    /// Conversion service endpoint accepting a multipart `file` upload
    #[arg(long, env = "DOCPREVIEW_CONVERTER_URL")]
    pub converter_url: Option<String>,

    /// Path to poppler's pdftoppm
    #[arg(long, default_value = "pdftoppm")]
    pub pdftoppm: PathBuf,

    /// Skip writing thumbnails
    #[arg(long, default_value_t = false)]
    pub no_thumbnails: bool,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings {
            color_mode: self.color,
            orientation: self.orientation,
            slides_per_page: usize::try_from(self.slides_per_page).unwrap_or(usize::MAX),
            presentation_mode: self.presentation,
        }
    }
}
