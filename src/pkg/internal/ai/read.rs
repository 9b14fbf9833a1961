use docx_rs::{
    read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent,
    TableChild, TableRowChild,
};
use scraper::{Html, Selector};
use standard_error::{Interpolate, StandardError};

use crate::prelude::Result;

// Acceptance floors for the layered extraction. A layer whose output meets
// its floor short-circuits the layers after it.
const RAW_TEXT_FLOOR: usize = 50;
const HTML_TEXT_FLOOR: usize = 20;
const READABLE_FLOOR: usize = 10;
const MIN_ALNUM_RATIO: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    RawText,
    HtmlFlatten,
    AsciiSalvage,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::RawText => "raw-text",
            ExtractionMethod::HtmlFlatten => "html-flatten",
            ExtractionMethod::AsciiSalvage => "ascii-salvage",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub method: ExtractionMethod,
}

/// Layered text recovery for DOC/DOCX uploads: raw-text walk first, html
/// conversion with table flattening when that comes back short, printable
/// byte salvage last. `None` means no layer recovered usable text.
pub fn extract_document(data: &[u8]) -> Option<ExtractedText> {
    let raw = docx_raw_text(data).unwrap_or_default().trim().to_string();
    let candidate = if raw.len() >= RAW_TEXT_FLOOR {
        ExtractedText {
            text: raw,
            method: ExtractionMethod::RawText,
        }
    } else {
        tracing::debug!("raw text came back with {} chars, converting to html", raw.len());
        let html = docx_to_html(data)
            .map(|h| flatten_html(&h))
            .unwrap_or_default()
            .trim()
            .to_string();
        if html.len() >= HTML_TEXT_FLOOR {
            ExtractedText {
                text: html,
                method: ExtractionMethod::HtmlFlatten,
            }
        } else {
            tracing::debug!("html text came back with {} chars, salvaging bytes", html.len());
            let salvaged = salvage_printable(data);
            // no layer met its floor: keep whichever recovered the most
            let mut text = raw;
            let mut method = ExtractionMethod::RawText;
            if html.len() > text.len() {
                text = html;
                method = ExtractionMethod::HtmlFlatten;
            }
            if salvaged.len() > text.len() {
                text = salvaged;
                method = ExtractionMethod::AsciiSalvage;
            }
            ExtractedText { text, method }
        }
    };
    if candidate.text.len() < READABLE_FLOOR || symbol_dominated(&candidate.text) {
        tracing::warn!(
            "document is unreadable, best layer ({}) recovered {} chars",
            candidate.method.as_str(),
            candidate.text.len()
        );
        return None;
    }
    tracing::debug!(
        "extracted {} chars via {}",
        candidate.text.len(),
        candidate.method.as_str()
    );
    Some(candidate)
}

fn symbol_dominated(text: &str) -> bool {
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return true;
    }
    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();
    (alnum as f64) / (total as f64) < MIN_ALNUM_RATIO
}

fn docx_raw_text(data: &[u8]) -> Result<String> {
    let docx = read_docx(data)
        .map_err(|e| StandardError::new("ERR-AI-005").interpolate_err(e.to_string()))?;
    let mut text = String::new();
    for child in docx.document.children {
        if let DocumentChild::Paragraph(p) = child {
            text.push_str(&paragraph_text(&p));
            text.push('\n');
        }
    }
    Ok(text)
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    for child in &paragraph.children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    if let RunChild::Text(t) = run_child {
                        out.push_str(&t.text);
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => {
                for link_child in &link.children {
                    if let ParagraphChild::Run(run) = link_child {
                        for run_child in &run.children {
                            if let RunChild::Text(t) = run_child {
                                out.push_str(&t.text);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    out
}

// The raw walk only sees paragraph runs; resumes that keep their content in
// layout tables come back nearly empty from it. This second pass renders
// paragraphs and tables to html so the cleanup step can flatten table rows
// into readable lines.
fn docx_to_html(data: &[u8]) -> Result<String> {
    let docx = read_docx(data)
        .map_err(|e| StandardError::new("ERR-AI-005").interpolate_err(e.to_string()))?;
    let mut html = String::new();
    for child in docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => {
                html.push_str("<p>");
                html.push_str(&escape(&paragraph_text(&p)));
                html.push_str("</p>");
            }
            DocumentChild::Table(t) => push_table(&mut html, &t),
            _ => {}
        }
    }
    Ok(html)
}

fn push_table(html: &mut String, table: &Table) {
    html.push_str("<table>");
    for row in &table.rows {
        let TableChild::TableRow(row) = row;
        html.push_str("<tr>");
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell;
            html.push_str("<td>");
            for content in &cell.children {
                if let TableCellContent::Paragraph(p) = content {
                    html.push_str(&escape(&paragraph_text(p)));
                    html.push(' ');
                }
            }
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn flatten_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let top_selector = Selector::parse("body > p, body > table").unwrap();
    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("td, th").unwrap();
    let mut lines: Vec<String> = Vec::new();
    for element in document.select(&top_selector) {
        if element.value().name() == "table" {
            for row in element.select(&row_selector) {
                let cells: Vec<String> = row
                    .select(&cell_selector)
                    .map(|cell| {
                        cell.text()
                            .flat_map(str::split_whitespace)
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .filter(|text| !text.is_empty())
                    .collect();
                if !cells.is_empty() {
                    lines.push(cells.join(" | "));
                }
            }
        } else {
            let text = element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                lines.push(text);
            }
        }
    }
    lines.join("\n")
}

fn salvage_printable(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() / 2);
    let mut last_was_space = true;
    for &byte in data {
        if (b' '..=b'~').contains(&byte) {
            out.push(byte as char);
            last_was_space = byte == b' ';
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.split_whitespace()
        .filter(|token| token.len() > 1 && token.chars().any(|c| c.is_alphanumeric()))
        .collect::<Vec<_>>()
        .join(" ")
}
