use crate::domain::error::{AppError, Result};
use docx_rs::{BreakType, Docx, Paragraph, Run, Style, StyleType};
use std::fs;
use std::path::Path;

const HEADING_STYLE_ID: &str = "Heading1";

/// Writes a Word document with an optional level-1 heading followed by one
/// body paragraph; newlines in `body` become line breaks.
pub fn write_docx(path: &Path, heading: Option<&str>, body: &str) -> Result<()> {
    let mut docx = Docx::new();

    if let Some(heading) = heading {
        docx = docx
            .add_style(
                Style::new(HEADING_STYLE_ID, StyleType::Paragraph)
                    .name("Heading 1")
                    .size(32)
                    .bold(),
            )
            .add_paragraph(
                Paragraph::new()
                    .style(HEADING_STYLE_ID)
                    .add_run(Run::new().add_text(heading)),
            );
    }

    docx = docx.add_paragraph(Paragraph::new().add_run(body_run(body)));

    let file = fs::File::create(path).map_err(|e| {
        AppError::IoError(format!("Failed to create {}: {}", path.display(), e))
    })?;
    docx.build()
        .pack(file)
        .map_err(|e| AppError::IoError(format!("Failed to write {}: {}", path.display(), e)))?;
    Ok(())
}

fn body_run(body: &str) -> Run {
    let mut run = Run::new();
    for (idx, line) in body.split('\n').enumerate() {
        if idx > 0 {
            run = run.add_break(BreakType::TextWrapping);
        }
        run = run.add_text(line.trim_end_matches('\r'));
    }
    run
}

/// Top-level paragraph texts of a `.docx`, joined with `\n`. Tables and
/// other block content are ignored.
pub fn read_docx_paragraphs(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .map_err(|e| AppError::IoError(format!("Failed to read DOCX file: {}", e)))?;
    let docx = docx_rs::read_docx(&bytes)
        .map_err(|e| AppError::ParseError(format!("Failed to parse DOCX file: {}", e)))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut buffer = String::new();
    for child in &paragraph.children {
        collect_paragraph_child(child, &mut buffer);
    }
    buffer
}

fn collect_paragraph_child(child: &docx_rs::ParagraphChild, buffer: &mut String) {
    match child {
        docx_rs::ParagraphChild::Run(run) => collect_run(run, buffer),
        docx_rs::ParagraphChild::Hyperlink(link) => {
            for link_child in &link.children {
                collect_paragraph_child(link_child, buffer);
            }
        }
        docx_rs::ParagraphChild::Insert(insert) => {
            for insert_child in &insert.children {
                if let docx_rs::InsertChild::Run(run) = insert_child {
                    collect_run(run, buffer);
                }
            }
        }
        _ => {}
    }
}

fn collect_run(run: &docx_rs::Run, buffer: &mut String) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(text) => buffer.push_str(&text.text),
            docx_rs::RunChild::Tab(_) => buffer.push('\t'),
            docx_rs::RunChild::Break(_) => buffer.push('\n'),
            _ => {}
        }
    }
}
