use std::time::Duration;

use mktmon_core::DocumentType;
use reqwest::Client;

use crate::error::FetchError;
use crate::extract;

/// Response bodies above this size are rejected rather than buffered.
const MAX_CONTENT_BYTES: usize = 10 * 1024 * 1024;

/// Extracted content for one fetched document.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub content_text: String,
    /// Raw markup, kept for HTML documents only.
    pub content_html: Option<String>,
    /// Characters of extracted text.
    pub content_length: i32,
    /// Bytes of the downloaded payload.
    pub file_size: i64,
    /// Type actually used for extraction, which may correct the declared one
    /// when the server reports a content type.
    pub effective_type: DocumentType,
}

/// HTTP downloader for document content.
///
/// One bounded GET per document; 404, 403, and other non-2xx statuses are
/// typed errors the caller records per document without aborting its batch.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a `Fetcher` with the configured timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Downloads one document and extracts its text.
    ///
    /// The declared type from discovery is re-checked against the server's
    /// `Content-Type`; the response header wins when present.
    ///
    /// # Errors
    ///
    /// - [`FetchError::NotFound`] on 404.
    /// - [`FetchError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`FetchError::TooLarge`] when the body exceeds the buffer cap.
    /// - [`FetchError::Extract`] when the payload cannot be parsed.
    /// - [`FetchError::Http`] on network failure or timeout.
    pub async fn fetch(
        &self,
        url: &str,
        declared_type: DocumentType,
    ) -> Result<FetchedDocument, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);

        let effective_type = match content_type.as_deref() {
            Some(ct) => DocumentType::infer(Some(ct), url),
            None => declared_type,
        };

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_CONTENT_BYTES {
            return Err(FetchError::TooLarge {
                url: url.to_owned(),
                max_bytes: MAX_CONTENT_BYTES,
            });
        }

        let file_size = i64::try_from(bytes.len()).unwrap_or(i64::MAX);

        let (content_text, content_html) = match effective_type {
            DocumentType::Html => {
                let html = String::from_utf8_lossy(&bytes).into_owned();
                let text = extract::html_to_text(&html).map_err(|reason| FetchError::Extract {
                    url: url.to_owned(),
                    reason,
                })?;
                (text, Some(html))
            }
            DocumentType::Pdf => {
                let text = extract::pdf_to_text(&bytes).map_err(|reason| FetchError::Extract {
                    url: url.to_owned(),
                    reason,
                })?;
                (text, None)
            }
            DocumentType::Docx => {
                let text = extract::docx_to_text(&bytes).map_err(|reason| FetchError::Extract {
                    url: url.to_owned(),
                    reason,
                })?;
                (text, None)
            }
            DocumentType::Pptx => {
                let text = extract::pptx_to_text(&bytes).map_err(|reason| FetchError::Extract {
                    url: url.to_owned(),
                    reason,
                })?;
                (text, None)
            }
            DocumentType::Unknown => {
                let text =
                    extract::collapse_whitespace(&String::from_utf8_lossy(&bytes));
                (text, None)
            }
        };

        if content_text.trim().is_empty() {
            return Err(FetchError::Extract {
                url: url.to_owned(),
                reason: "no extractable text".to_owned(),
            });
        }

        tracing::debug!(
            url,
            bytes = file_size,
            chars = content_text.len(),
            document_type = %effective_type,
            "document fetched"
        );

        let content_length = i32::try_from(content_text.chars().count()).unwrap_or(i32::MAX);

        Ok(FetchedDocument {
            content_text,
            content_html,
            content_length,
            file_size,
            effective_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(5, "mktmon-test/0.1").expect("build fetcher")
    }

    #[tokio::test]
    async fn fetches_and_extracts_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html><body><p>Acme expands into Canada.</p></body></html>"),
            )
            .mount(&server)
            .await;

        let fetched = fetcher()
            .fetch(&format!("{}/article", server.uri()), DocumentType::Html)
            .await
            .expect("fetch should succeed");

        assert!(fetched.content_text.contains("Acme expands into Canada."));
        assert!(fetched.content_html.is_some());
        assert_eq!(fetched.effective_type, DocumentType::Html);
        assert!(fetched.content_length > 0);
        assert!(fetched.file_size > 0);
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/gone", server.uri()), DocumentType::Html)
            .await
            .expect_err("404 should be NotFound");

        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn forbidden_is_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/blocked", server.uri()), DocumentType::Html)
            .await
            .expect_err("403 should be UnexpectedStatus");

        assert!(matches!(err, FetchError::UnexpectedStatus { status: 403, .. }));
    }

    #[tokio::test]
    async fn content_type_header_overrides_declared_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/really-html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<p>Plain page</p>"),
            )
            .mount(&server)
            .await;

        let fetched = fetcher()
            .fetch(&format!("{}/really-html", server.uri()), DocumentType::Pdf)
            .await
            .expect("fetch should succeed");

        assert_eq!(fetched.effective_type, DocumentType::Html);
    }

    #[tokio::test]
    async fn empty_body_is_an_extract_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body></body></html>"),
            )
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/empty", server.uri()), DocumentType::Html)
            .await
            .expect_err("empty page should fail extraction");

        assert!(matches!(err, FetchError::Extract { .. }));
    }
}
