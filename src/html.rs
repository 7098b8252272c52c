use crate::reader::CellValue;

/// Escape text for use in HTML content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render a grid as a bordered table, keeping at most `max_rows` rows.
pub fn table(rows: &[Vec<CellValue>], max_rows: Option<usize>) -> String {
    let limit = max_rows.unwrap_or(rows.len());
    let mut out = String::from("<table border=\"1\" style=\"border-collapse:collapse\">\n");
    for row in rows.iter().take(limit) {
        out.push_str("<tr>");
        for cell in row {
            out.push_str("<td>");
            out.push_str(&escape(&cell.to_string()));
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    out
}

/// Render slide texts as numbered cards.
pub fn slides(texts: &[String]) -> String {
    if texts.is_empty() {
        return "<p>No slide text found.</p>\n".to_string();
    }
    let mut out = String::new();
    for (i, text) in texts.iter().enumerate() {
        let body = if text.is_empty() {
            "No text content".to_string()
        } else {
            escape(text)
        };
        out.push_str(&format!(
            "<section class=\"slide\"><h2>Slide {}</h2><p>{}</p></section>\n",
            i + 1,
            body
        ));
    }
    out
}

/// Wrap a fragment in a minimal standalone page.
pub fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        body
    )
}
