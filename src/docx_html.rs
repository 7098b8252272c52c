use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docx_rust::document::{
    BodyContent, ParagraphContent, RunContent, TableCellContent, TableRowContent,
};
use docx_rust::formatting::CharacterProperty;
use docx_rust::Docx;

use crate::format;
use crate::html::escape;

/// Deepest list level WordprocessingML defines (`w:ilvl` runs 0 to 8).
const MAX_LIST_LEVEL: isize = 8;

/// Link schemes that are rendered as live links; anything else stays text.
const LINK_SCHEMES: [&str; 3] = ["http://", "https://", "mailto:"];

/// Convert a parsed DOCX document body to an HTML fragment.
///
/// This is a structural conversion, not a layout engine: there is no notion
/// of pages, so thumbnails clip the fragment instead of cutting a first page.
pub fn docx_to_html(docx: &Docx) -> String {
    let mut ctx = ConvertContext {
        docx,
        output: String::new(),
        open_lists: Vec::new(),
    };

    for content in &docx.document.body.content {
        ctx.convert_body_content(content);
    }
    ctx.close_lists(0);

    ctx.output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

impl ListKind {
    fn tag(&self) -> &'static str {
        match self {
            ListKind::Bullet => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

struct ConvertContext<'a> {
    docx: &'a Docx<'a>,
    output: String,
    /// Lists currently open, outermost first; index is the nesting level.
    open_lists: Vec<ListKind>,
}

impl<'a> ConvertContext<'a> {
    fn convert_body_content(&mut self, content: &BodyContent) {
        match content {
            BodyContent::Paragraph(para) => self.convert_paragraph(para),
            BodyContent::Table(table) => {
                self.close_lists(0);
                self.convert_table(table);
            }
            BodyContent::Sdt(sdt) => {
                if let Some(ref sdt_content) = sdt.content {
                    for item in &sdt_content.content {
                        self.convert_body_content(item);
                    }
                }
            }
            _ => {}
        }
    }

    fn convert_paragraph(&mut self, para: &docx_rust::document::Paragraph) {
        let mut heading_level: Option<u8> = None;
        let mut numbering: Option<(isize, isize)> = None; // (num_id, level)

        if let Some(ref prop) = para.property {
            if let Some(ref style_id) = prop.style_id {
                heading_level = heading_level_for(style_id.value.as_ref());
            }

            if let Some(ref num_prop) = prop.numbering {
                if let (Some(ref id), Some(ref level)) = (&num_prop.id, &num_prop.level) {
                    numbering = Some((id.value, level.value));
                }
            }
        }

        let inline_html = self.collect_inline_content(para);
        let inline_html = inline_html.trim();

        if let Some((num_id, level)) = numbering {
            let kind = self.resolve_list_kind(num_id, level);
            self.enter_list(level.clamp(0, MAX_LIST_LEVEL) as usize, kind);
            self.output.push_str("<li>");
            self.output.push_str(inline_html);
            self.output.push_str("</li>\n");
            return;
        }

        self.close_lists(0);

        if inline_html.is_empty() {
            return;
        }

        if let Some(level) = heading_level {
            self.output.push_str(&format!("<h{}>{}</h{}>\n", level, inline_html, level));
            return;
        }

        self.output.push_str("<p>");
        self.output.push_str(inline_html);
        self.output.push_str("</p>\n");
    }

    /// Make `level` the innermost open list, of the given kind.
    fn enter_list(&mut self, level: usize, kind: ListKind) {
        self.close_lists(level + 1);
        if self.open_lists.len() == level + 1 && self.open_lists[level] != kind {
            self.close_lists(level);
        }
        while self.open_lists.len() <= level {
            self.output.push_str(&format!("<{}>\n", kind.tag()));
            self.open_lists.push(kind);
        }
    }

    /// Close lists until only `keep` remain open.
    fn close_lists(&mut self, keep: usize) {
        while self.open_lists.len() > keep {
            if let Some(kind) = self.open_lists.pop() {
                self.output.push_str(&format!("</{}>\n", kind.tag()));
            }
        }
    }

    fn collect_inline_content(&self, para: &docx_rust::document::Paragraph) -> String {
        let mut result = String::new();

        for pc in &para.content {
            match pc {
                ParagraphContent::Run(run) => {
                    let html = self.collect_run_html(run);
                    if !html.is_empty() {
                        result.push_str(&format_run(&html, &run.property));
                    }
                }
                ParagraphContent::Link(link) => {
                    let display = link
                        .content
                        .as_ref()
                        .map(|run| self.collect_run_html(run))
                        .unwrap_or_default();

                    match self.resolve_hyperlink_target(link) {
                        Some(url) => result.push_str(&link_html(&url, display)),
                        None => result.push_str(&display),
                    }
                }
                _ => {}
            }
        }

        result
    }

    fn collect_run_html(&self, run: &docx_rust::document::Run) -> String {
        let mut html = String::new();

        for rc in &run.content {
            match rc {
                RunContent::Text(t) => html.push_str(&escape(&t.text)),
                RunContent::Break(_) => html.push_str("<br>"),
                RunContent::Tab(_) => html.push_str("&emsp;"),
                RunContent::Drawing(drawing) => {
                    if let Some(img) = self.convert_drawing(drawing) {
                        html.push_str(&img);
                    }
                }
                _ => {}
            }
        }

        html
    }

    fn convert_drawing(&self, drawing: &docx_rust::document::Drawing) -> Option<String> {
        if let Some(ref inline) = drawing.inline {
            if let Some(ref graphic) = inline.graphic {
                if let Some(pic) = graphic.data.children.first() {
                    let embed_id = pic.fill.blip.embed.as_ref();
                    let alt = inline.doc_property.descr.as_deref().unwrap_or("");
                    return self.resolve_image(embed_id, alt);
                }
            }
        }

        if let Some(ref anchor) = drawing.anchor {
            if let Some(ref graphic) = anchor.graphic {
                if let Some(pic) = graphic.data.children.first() {
                    let embed_id = pic.fill.blip.embed.as_ref();
                    let alt = anchor.doc_property.descr.as_deref().unwrap_or("");
                    return self.resolve_image(embed_id, alt);
                }
            }
        }

        None
    }

    /// Inline an embedded picture as a `data:` URL.
    fn resolve_image(&self, embed_id: &str, alt: &str) -> Option<String> {
        let target = self
            .docx
            .document_rels
            .as_ref()?
            .relationships
            .iter()
            .find(|r| r.id.as_ref() == embed_id)?
            .target
            .as_ref();

        // Relationship targets are relative to word/.
        let full_path = format!("word/{}", target);
        let mut bytes = None;
        for (path, (_media_type, data)) in &self.docx.media {
            if path.as_str() == full_path || path.as_str() == target {
                bytes = Some(data.to_vec());
                break;
            }
        }
        let bytes = bytes?;

        Some(format!(
            "<img src=\"data:{};base64,{}\" alt=\"{}\">",
            image_mime(target),
            STANDARD.encode(bytes),
            escape(alt)
        ))
    }

    fn resolve_hyperlink_target(&self, link: &docx_rust::document::Hyperlink) -> Option<String> {
        if let Some(ref anchor) = link.anchor {
            return Some(format!("#{}", anchor));
        }

        if let Some(ref id) = link.id {
            if let Some(ref rels) = self.docx.document_rels {
                for r in &rels.relationships {
                    if r.id.as_ref() == id.as_ref() {
                        return Some(r.target.to_string());
                    }
                }
            }
        }

        None
    }

    fn resolve_list_kind(&self, num_id: isize, level: isize) -> ListKind {
        let Some(ref numbering) = self.docx.numbering else {
            return ListKind::Bullet;
        };

        for num in &numbering.numberings {
            if num.num_id != Some(num_id) {
                continue;
            }
            let abstract_id = match &num.abstract_num_id {
                Some(aid) => aid.value,
                None => continue,
            };

            for abstract_num in &numbering.abstract_numberings {
                if abstract_num.abstract_num_id != abstract_id {
                    continue;
                }
                for lvl in &abstract_num.levels {
                    if lvl.i_level != Some(level) {
                        continue;
                    }
                    if let Some(ref fmt) = lvl.number_format {
                        return match fmt.value.as_ref() {
                            "decimal" | "upperRoman" | "lowerRoman" | "upperLetter"
                            | "lowerLetter" => ListKind::Ordered,
                            _ => ListKind::Bullet,
                        };
                    }
                }
            }
        }

        ListKind::Bullet
    }

    fn convert_table(&mut self, table: &docx_rust::document::Table) {
        let mut rows: Vec<Vec<String>> = Vec::new();

        for row in &table.rows {
            let mut cells: Vec<String> = Vec::new();
            for cell_content in &row.cells {
                if let TableRowContent::TableCell(cell) = cell_content {
                    cells.push(self.collect_cell_html(cell));
                }
            }
            if !cells.is_empty() {
                rows.push(cells);
            }
        }

        if rows.is_empty() {
            return;
        }

        self.output.push_str("<table>\n");
        for row in &rows {
            self.output.push_str("<tr>");
            for cell in row {
                self.output.push_str("<td>");
                self.output.push_str(cell);
                self.output.push_str("</td>");
            }
            self.output.push_str("</tr>\n");
        }
        self.output.push_str("</table>\n");
    }

    fn collect_cell_html(&self, cell: &docx_rust::document::TableCell) -> String {
        let mut parts: Vec<String> = Vec::new();

        for tc in &cell.content {
            let TableCellContent::Paragraph(para) = tc;
            let html = self.collect_inline_content(para);
            let trimmed = html.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }

        parts.join("<br>")
    }
}

/// Hyperlink markup for `url`, or just the label when the target is not a
/// web, mail or in-document link.
fn link_html(url: &str, display: String) -> String {
    let label = if display.is_empty() { escape(url) } else { display };
    let target = url.trim().to_ascii_lowercase();
    let allowed = target.starts_with('#') || LINK_SCHEMES.iter().any(|scheme| target.starts_with(scheme));
    if allowed {
        format!("<a href=\"{}\">{}</a>", escape(url.trim()), label)
    } else {
        tracing::debug!("dropping link target {}", url);
        label
    }
}

fn heading_level_for(style_id: &str) -> Option<u8> {
    match style_id {
        "Heading1" | "heading1" | "heading 1" => Some(1),
        "Heading2" | "heading2" | "heading 2" => Some(2),
        "Heading3" | "heading3" | "heading 3" => Some(3),
        "Heading4" | "heading4" | "heading 4" => Some(4),
        "Heading5" | "heading5" | "heading 5" => Some(5),
        "Heading6" | "heading6" | "heading 6" => Some(6),
        "Title" | "title" => Some(1),
        "Subtitle" | "subtitle" => Some(2),
        _ => None,
    }
}

fn image_mime(target: &str) -> &'static str {
    match format::extension(target).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("tif" | "tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Wrap already-escaped run HTML according to its character properties.
fn format_run(html: &str, props: &Option<CharacterProperty>) -> String {
    let Some(props) = props else {
        return html.to_string();
    };

    if html.trim().is_empty() {
        return html.to_string();
    }

    let is_bold = props
        .bold
        .as_ref()
        .map(|b| b.value != Some(false))
        .unwrap_or(false);
    let is_italic = props
        .italics
        .as_ref()
        .map(|i| i.value != Some(false))
        .unwrap_or(false);
    let is_strike = props.strike.is_some() || props.dstrike.is_some();

    let mut result = html.to_string();
    if is_strike {
        result = format!("<s>{}</s>", result);
    }
    if is_italic {
        result = format!("<em>{}</em>", result);
    }
    if is_bold {
        result = format!("<strong>{}</strong>", result);
    }
    result
}
