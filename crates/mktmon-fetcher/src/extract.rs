//! Format-specific text extraction.
//!
//! Extractors return a plain `String` reason on failure; the fetch client
//! wraps it with the document URL as [`crate::FetchError::Extract`].

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Collapse horizontal whitespace runs and stacked blank lines.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    let collapsed = SPACE_RUNS.replace_all(text, " ");
    let collapsed = BLANK_LINES.replace_all(&collapsed, "\n\n");
    collapsed
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Render the visible text of an HTML page. Scripts and styles are dropped
/// by the renderer.
///
/// # Errors
///
/// Returns the renderer's failure reason.
pub fn html_to_text(html: &str) -> Result<String, String> {
    let text = html2text::from_read(html.as_bytes(), 120).map_err(|e| e.to_string())?;
    Ok(collapse_whitespace(&text))
}

/// Extract the embedded text of a PDF.
///
/// # Errors
///
/// Returns the parser's failure reason (encrypted or malformed files).
pub fn pdf_to_text(bytes: &[u8]) -> Result<String, String> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())?;
    Ok(collapse_whitespace(&text))
}

/// Extract the text runs of a DOCX body (`word/document.xml`).
///
/// # Errors
///
/// Returns a reason if the container or body XML cannot be read.
pub fn docx_to_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a DOCX archive: {e}"))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing word/document.xml: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("unreadable document body: {e}"))?;

    let text = ooxml_text_runs(&xml, b"w:t", b"w:p")?;
    Ok(collapse_whitespace(&text))
}

/// Extract the text runs of every slide in a PPTX, in slide order.
///
/// # Errors
///
/// Returns a reason if the container or any slide XML cannot be read.
pub fn pptx_to_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a PPTX archive: {e}"))?;

    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(ToOwned::to_owned)
        .collect();
    slide_names.sort();

    let mut text = String::new();
    for name in &slide_names {
        let mut xml = String::new();
        archive
            .by_name(name)
            .map_err(|e| format!("missing slide {name}: {e}"))?
            .read_to_string(&mut xml)
            .map_err(|e| format!("unreadable slide {name}: {e}"))?;
        text.push_str(&ooxml_text_runs(&xml, b"a:t", b"a:p")?);
        text.push('\n');
    }

    Ok(collapse_whitespace(&text))
}

/// Collect the character content of `text_tag` elements, inserting a line
/// break at each closing `para_tag`.
fn ooxml_text_runs(xml: &str, text_tag: &[u8], para_tag: &[u8]) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == text_tag => in_text_run = true,
            Ok(Event::End(e)) => {
                if e.name().as_ref() == text_tag {
                    in_text_run = false;
                } else if e.name().as_ref() == para_tag {
                    out.push('\n');
                }
            }
            Ok(Event::Text(t)) if in_text_run => {
                let chunk = t.unescape().map_err(|e| format!("bad XML text: {e}"))?;
                out.push_str(&chunk);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed XML: {e}")),
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn html_strips_scripts_and_styles() {
        let html = r"<html><head><style>body { color: red }</style></head>
            <body><script>alert('x')</script><h1>Acme acquires Borealis</h1>
            <p>The deal closed  on   Friday.</p></body></html>";
        let text = html_to_text(html).expect("extract html");
        assert!(text.contains("Acme acquires Borealis"));
        assert!(text.contains("The deal closed on Friday."));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn collapse_whitespace_trims_and_collapses() {
        let input = "a   b\t\tc  \n\n\n\n\nd\n";
        assert_eq!(collapse_whitespace(input), "a b c\n\nd");
    }

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (name, content) in entries {
                writer.start_file(*name, options).expect("start zip entry");
                writer.write_all(content.as_bytes()).expect("write zip entry");
            }
            writer.finish().expect("finish zip");
        }
        cursor.into_inner()
    }

    #[test]
    fn docx_extracts_paragraph_text() {
        let body = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
                <w:p><w:r><w:t>Second</w:t></w:r><w:r><w:t> paragraph.</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let bytes = zip_with(&[("word/document.xml", body)]);
        let text = docx_to_text(&bytes).expect("extract docx");
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn docx_without_body_is_an_error() {
        let bytes = zip_with(&[("word/other.xml", "<x/>")]);
        let err = docx_to_text(&bytes).expect_err("missing body should fail");
        assert!(err.contains("word/document.xml"));
    }

    #[test]
    fn pptx_extracts_slides_in_order() {
        let slide = |t: &str| {
            format!(
                r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
                     <a:p><a:r><a:t>{t}</a:t></a:r></a:p>
                   </p:sld>"#
            )
        };
        let s1 = slide("Slide one");
        let s2 = slide("Slide two");
        let bytes = zip_with(&[
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
        ]);
        let text = pptx_to_text(&bytes).expect("extract pptx");
        assert_eq!(text, "Slide one\n\nSlide two");
    }

    #[test]
    fn garbage_bytes_are_not_a_docx() {
        assert!(docx_to_text(b"not a zip file").is_err());
    }
}
