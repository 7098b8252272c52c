use serde::Serialize;

/// How a document is interpreted, derived once from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FormatKind {
    Pdf,
    WordMarkup,
    Spreadsheet,
    Presentation,
    /// Any other extension: the bytes are shown directly.
    Image,
    /// No extension at all.
    Unknown,
}

impl FormatKind {
    /// Map a file name to its format by extension alone. Never fails.
    pub fn from_name(name: &str) -> Self {
        match extension(name).as_deref() {
            Some("pdf") => FormatKind::Pdf,
            Some("doc" | "docx") => FormatKind::WordMarkup,
            Some("xls" | "xlsx") => FormatKind::Spreadsheet,
            Some("ppt" | "pptx") => FormatKind::Presentation,
            Some(_) => FormatKind::Image,
            None => FormatKind::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormatKind::Pdf => "PDF",
            FormatKind::WordMarkup => "Word document",
            FormatKind::Spreadsheet => "Spreadsheet",
            FormatKind::Presentation => "Presentation",
            FormatKind::Image => "Image",
            FormatKind::Unknown => "Unknown",
        }
    }
}

/// Lower-cased text after the final `.` of the name's last path segment.
pub fn extension(name: &str) -> Option<String> {
    let file_name = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
