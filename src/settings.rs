use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::format::FormatKind;
use crate::pdf::TargetBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum ColorMode {
    #[default]
    Color,
    BlackAndWhite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Box a first-page thumbnail is fitted into.
    pub fn thumbnail_box(&self) -> TargetBox {
        match self {
            Orientation::Portrait => TargetBox {
                width: 120.0,
                height: 160.0,
            },
            Orientation::Landscape => TargetBox {
                width: 160.0,
                height: 120.0,
            },
        }
    }
}

/// How presentations are previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum PresentationMode {
    /// Extract slide text locally.
    #[default]
    Text,
    /// Convert through the conversion service and render as a PDF.
    Remote,
}

/// User-facing print and preview settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Display-only; decoding ignores it.
    pub color_mode: ColorMode,
    pub orientation: Orientation,
    /// Batch size for the thumbnail grid. Always at least 1.
    pub slides_per_page: usize,
    pub presentation_mode: PresentationMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Color,
            orientation: Orientation::Portrait,
            slides_per_page: 1,
            presentation_mode: PresentationMode::Text,
        }
    }
}

impl Settings {
    pub fn with_slides_per_page(mut self, slides_per_page: usize) -> Self {
        self.slides_per_page = slides_per_page.max(1);
        self
    }

    pub fn grouped(&self) -> bool {
        self.slides_per_page > 1
    }

    /// Whether moving from `self` to `next` invalidates the current preview of
    /// a `kind` document. `remote` says whether presentations are currently
    /// previewed through the conversion service.
    pub fn invalidates(&self, next: &Settings, kind: FormatKind, remote: bool) -> bool {
        match kind {
            FormatKind::Presentation => {
                self.presentation_mode != next.presentation_mode
                    || (remote && self.slides_per_page != next.slides_per_page)
            }
            FormatKind::Pdf => self.grouped() != next.grouped(),
            FormatKind::WordMarkup
            | FormatKind::Spreadsheet
            | FormatKind::Image
            | FormatKind::Unknown => false,
        }
    }
}
