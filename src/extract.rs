//! Text extraction for uploaded documents.

use std::borrow::Cow;
use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{RagError, Result};

/// Payload formats recognised by filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word processing document.
    Docx,
    /// Comma separated values.
    Csv,
    /// Anything else, decoded as (possibly damaged) UTF-8.
    Text,
}

impl DocumentFormat {
    /// Infers the format from a case-insensitive filename suffix.
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.trim().to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Self::Pdf
        } else if lower.ends_with(".docx") {
            Self::Docx
        } else if lower.ends_with(".csv") {
            Self::Csv
        } else {
            Self::Text
        }
    }
}

/// Converts an uploaded payload into a single newline-joined string.
///
/// Returns `Ok(None)` when the payload is empty or yields only whitespace.
/// Parser failures for PDF, DOCX and CSV payloads are returned as
/// [`RagError::Extraction`].
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<Option<String>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let text = match DocumentFormat::from_filename(filename) {
        DocumentFormat::Pdf => extract_pdf(bytes)?,
        DocumentFormat::Docx => extract_docx(bytes)?,
        DocumentFormat::Csv => extract_csv(bytes)?,
        DocumentFormat::Text => decode_lossy(bytes).into_owned(),
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}

/// Decodes UTF-8, discarding invalid byte sequences instead of replacing them.
pub fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let mut out = String::with_capacity(bytes.len());
            for chunk in bytes.utf8_chunks() {
                out.push_str(chunk.valid());
            }
            Cow::Owned(out)
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|err| RagError::Extraction(format!("PDF parsing failed: {err}")))?;
    // pdf-extract separates pages with form feeds
    let pages: Vec<&str> = text.split('\u{000C}').map(str::trim_end).collect();
    Ok(pages.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| RagError::Extraction(format!("invalid DOCX archive: {err}")))?;
    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| RagError::Extraction("no word/document.xml in DOCX".to_string()))?
        .read_to_string(&mut document_xml)
        .map_err(|err| RagError::Extraction(format!("cannot read document.xml: {err}")))?;
    Ok(docx_paragraphs(&document_xml).join("\n"))
}

fn docx_paragraphs(xml: &str) -> Vec<String> {
    static PARAGRAPH: OnceLock<Regex> = OnceLock::new();
    static RUN_TEXT: OnceLock<Regex> = OnceLock::new();
    let paragraph =
        PARAGRAPH.get_or_init(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("paragraph regex"));
    let run_text = RUN_TEXT
        .get_or_init(|| Regex::new(r"(?s)<w:t(?: [^>]*)?>(.*?)</w:t>").expect("run text regex"));

    paragraph
        .find_iter(xml)
        .map(|para| {
            run_text
                .captures_iter(para.as_str())
                .filter_map(|caps| caps.get(1))
                .map(|text| decode_xml_entities(text.as_str()))
                .collect::<String>()
        })
        .collect()
}

fn decode_xml_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn extract_csv(bytes: &[u8]) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|err| RagError::Extraction(format!("CSV record error: {err}")))?;
        rows.push(record.iter().collect::<Vec<_>>().join(", "));
    }
    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            writer
                .start_file("word/document.xml", options)
                .expect("start file");
            writer
                .write_all(document_xml.as_bytes())
                .expect("write xml");
            writer.finish().expect("finish zip");
        }
        buf.into_inner()
    }

    #[test]
    fn format_is_inferred_case_insensitively() {
        assert_eq!(DocumentFormat::from_filename("Report.PDF"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_filename("a.Docx"), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_filename("rows.csv"), DocumentFormat::Csv);
        assert_eq!(DocumentFormat::from_filename("notes.md"), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_filename("pdf"), DocumentFormat::Text);
    }

    #[test]
    fn empty_and_blank_payloads_have_no_content() {
        assert_eq!(extract_text("a.txt", b"").unwrap(), None);
        assert_eq!(extract_text("a.txt", b"  \n ").unwrap(), None);
        assert_eq!(extract_text("a.csv", b"").unwrap(), None);
    }

    #[test]
    fn plain_text_drops_invalid_utf8() {
        let bytes = b"caf\xc3\xa9 \xff\xfeok";
        assert_eq!(extract_text("x.bin", bytes).unwrap().as_deref(), Some("café ok"));
    }

    #[test]
    fn csv_rows_become_lines() {
        let bytes = b"name,alt\nISS,408\nHubble,540,extra\n";
        let text = extract_text("sats.csv", bytes).unwrap().unwrap();
        assert_eq!(text, "name, alt\nISS, 408\nHubble, 540, extra");
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0"?><w:document><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
            <w:p w:rsidR="00A1"><w:r><w:t>Fish &amp; chips</w:t></w:r></w:p>
            </w:body></w:document>"#;
        let text = extract_text("letter.docx", &docx_bytes(xml)).unwrap().unwrap();
        assert_eq!(text, "Hello world\nFish & chips");
    }

    #[test]
    fn corrupt_docx_is_an_extraction_error() {
        let err = extract_text("broken.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }

    #[test]
    fn corrupt_pdf_is_an_extraction_error() {
        let err = extract_text("broken.pdf", b"not a pdf at all").unwrap_err();
        match err {
            RagError::Extraction(message) => assert!(message.starts_with("PDF parsing failed")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
