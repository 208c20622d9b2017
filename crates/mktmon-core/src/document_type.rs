use serde::{Deserialize, Serialize};

/// Content format of a discovered document, driving the extraction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Html,
    Pdf,
    Docx,
    Pptx,
    Unknown,
}

impl DocumentType {
    /// String form matching the `documents.document_type` CHECK constraint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Html => "html",
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
            DocumentType::Pptx => "pptx",
            DocumentType::Unknown => "unknown",
        }
    }

    /// Infer the document type from an optional content-type hint, falling
    /// back to the URL's path extension. HTML is the default for plain web
    /// pages with no extension.
    #[must_use]
    pub fn infer(content_type: Option<&str>, url: &str) -> Self {
        if let Some(ct) = content_type {
            let ct = ct.to_lowercase();
            if ct.contains("text/html") || ct.contains("application/xhtml") {
                return DocumentType::Html;
            }
            if ct.contains("application/pdf") {
                return DocumentType::Pdf;
            }
            if ct.contains("wordprocessingml") {
                return DocumentType::Docx;
            }
            if ct.contains("presentationml") {
                return DocumentType::Pptx;
            }
        }

        match url_extension(url).as_deref() {
            Some("pdf") => DocumentType::Pdf,
            Some("docx") => DocumentType::Docx,
            Some("pptx") => DocumentType::Pptx,
            Some("html" | "htm") | None => DocumentType::Html,
            Some(_) => DocumentType::Unknown,
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(DocumentType::Html),
            "pdf" => Ok(DocumentType::Pdf),
            "docx" => Ok(DocumentType::Docx),
            "pptx" => Ok(DocumentType::Pptx),
            "unknown" => Ok(DocumentType::Unknown),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension of the URL path, ignoring query and fragment.
/// A bare domain has no path and therefore no extension.
fn url_extension(url: &str) -> Option<String> {
    let rest = url.split_once("//").map_or(url, |(_, rest)| rest);
    let (_, path) = rest.split_once('/')?;
    let path = path.split(['?', '#']).next()?;
    let last_segment = path.rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_prefers_content_type_over_extension() {
        let t = DocumentType::infer(Some("application/pdf"), "https://x.test/report.html");
        assert_eq!(t, DocumentType::Pdf);
    }

    #[test]
    fn infer_pdf_from_extension() {
        let t = DocumentType::infer(None, "https://x.test/q3/report.pdf?dl=1");
        assert_eq!(t, DocumentType::Pdf);
    }

    #[test]
    fn infer_docx_content_type() {
        let ct = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
        assert_eq!(DocumentType::infer(Some(ct), "https://x.test/f"), DocumentType::Docx);
    }

    #[test]
    fn bare_page_url_defaults_to_html() {
        let t = DocumentType::infer(None, "https://news.example.com/articles/launch");
        assert_eq!(t, DocumentType::Html);
    }

    #[test]
    fn bare_domain_defaults_to_html() {
        let t = DocumentType::infer(None, "https://news.example.com");
        assert_eq!(t, DocumentType::Html);
    }

    #[test]
    fn unknown_extension_is_unknown() {
        let t = DocumentType::infer(None, "https://x.test/data.csv");
        assert_eq!(t, DocumentType::Unknown);
    }

    #[test]
    fn roundtrip_from_str() {
        for t in [
            DocumentType::Html,
            DocumentType::Pdf,
            DocumentType::Docx,
            DocumentType::Pptx,
            DocumentType::Unknown,
        ] {
            assert_eq!(t.as_str().parse::<DocumentType>().unwrap(), t);
        }
    }
}
