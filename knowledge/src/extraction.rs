//! Turning a source URL into plain text.
//!
//! The URL's shape picks the strategy:
//!
//! | Source                       | Strategy                         |
//! |------------------------------|----------------------------------|
//! | Google Doc                   | public `export?format=txt`       |
//! | Google Sheet                 | public `export?format=csv`       |
//! | `.txt` / `.md` / `.csv`      | body as-is                       |
//! | `.pdf` / `.docx` / `.xlsx`   | unsupported                      |
//! | anything else                | HTML, visible text only          |

use async_trait::async_trait;
use scraper::{Html, Node};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Errors raised while extracting a document.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    /// The document could not be fetched (private, missing, network).
    #[error("could not fetch {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The document was fetched but holds no text.
    #[error("no text found at {0}")]
    Empty(String),
}

/// Produces the plain text of a document.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, ExtractionError>;
}

/// How a URL is turned into text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    GoogleDoc { id: String },
    GoogleSheet { id: String },
    PlainText,
    Binary { extension: String },
    Html,
}

impl SourceKind {
    /// Classify `url` by host and path.
    pub fn classify(url: &Url) -> Self {
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.collect())
            .unwrap_or_default();
        if url.host_str() == Some("docs.google.com") {
            let id = segments
                .iter()
                .position(|segment| *segment == "d")
                .and_then(|i| segments.get(i + 1))
                .map(|id| (*id).to_string());
            match (segments.first().copied(), id) {
                (Some("document"), Some(id)) => return Self::GoogleDoc { id },
                (Some("spreadsheets"), Some(id)) => return Self::GoogleSheet { id },
                _ => {}
            }
        }

        let extension = segments
            .last()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("txt" | "md" | "csv") => Self::PlainText,
            Some(ext @ ("pdf" | "docx" | "xlsx")) => Self::Binary {
                extension: ext.to_string(),
            },
            _ => Self::Html,
        }
    }

    /// Where the text is actually downloaded from.
    fn download_url(&self, url: &Url) -> String {
        match self {
            Self::GoogleDoc { id } => {
                format!("https://docs.google.com/document/d/{id}/export?format=txt")
            }
            Self::GoogleSheet { id } => {
                format!("https://docs.google.com/spreadsheets/d/{id}/export?format=csv")
            }
            _ => url.to_string(),
        }
    }
}

/// Fetches documents over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpExtractor {
    client: reqwest::Client,
}

impl HttpExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractionError> {
        let unreachable = |reason: String| ExtractionError::Unreachable {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(format!("HTTP {status}")));
        }
        response.text().await.map_err(|e| unreachable(e.to_string()))
    }
}

#[async_trait]
impl DocumentExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> Result<String, ExtractionError> {
        let parsed = Url::parse(url).map_err(|_| ExtractionError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ExtractionError::InvalidUrl(url.to_string()));
        }

        let kind = SourceKind::classify(&parsed);
        debug!("Extracting {url} as {kind:?}");
        if let SourceKind::Binary { extension } = &kind {
            return Err(ExtractionError::UnsupportedFormat(extension.clone()));
        }

        let body = self.fetch(&kind.download_url(&parsed)).await?;
        let text = match kind {
            SourceKind::Html => html_to_text(&body),
            _ => body.trim().to_string(),
        };

        if text.is_empty() {
            return Err(ExtractionError::Empty(url.to_string()));
        }
        info!("Extracted {} characters from {url}", text.len());
        Ok(text)
    }
}

/// Visible text of an HTML page, one text node per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in document.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            matches!(
                ancestor.value(),
                Node::Element(element) if matches!(element.name(), "script" | "style" | "noscript" | "template")
            )
        });
        let text = text.trim();
        if !hidden && !text.is_empty() {
            lines.push(text.to_string());
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn classify(url: &str) -> SourceKind {
        SourceKind::classify(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_classify_google_sources() {
        assert_eq!(
            classify("https://docs.google.com/document/d/abc123/edit?usp=sharing"),
            SourceKind::GoogleDoc {
                id: "abc123".to_string()
            }
        );
        assert_eq!(
            classify("https://docs.google.com/spreadsheets/d/sheet9/edit#gid=0"),
            SourceKind::GoogleSheet {
                id: "sheet9".to_string()
            }
        );
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify("https://example.com/notes.TXT"), SourceKind::PlainText);
        assert_eq!(
            classify("https://example.com/report.pdf"),
            SourceKind::Binary {
                extension: "pdf".to_string()
            }
        );
        assert_eq!(classify("https://example.com/wiki/Electronics"), SourceKind::Html);
        assert_eq!(classify("https://example.com/"), SourceKind::Html);
    }

    #[test]
    fn test_google_export_urls() {
        let url = Url::parse("https://docs.google.com/document/d/abc/edit").unwrap();
        assert_eq!(
            SourceKind::classify(&url).download_url(&url),
            "https://docs.google.com/document/d/abc/export?format=txt"
        );
    }

    #[test]
    fn test_html_to_text_drops_scripts_and_styles() {
        let html = r#"<html><head><title>Devices</title><style>p { color: red }</style></head>
            <body><h1>Electronics</h1>
            <p>Electronic devices process electrical signals.</p>
            <script>console.log("hidden")</script></body></html>"#;

        assert_eq!(
            html_to_text(html),
            "Devices\nElectronics\nElectronic devices process electrical signals."
        );
    }

    #[tokio::test]
    async fn test_extract_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/electronics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><p>Electronic devices process electrical signals.</p></body></html>",
            ))
            .mount(&server)
            .await;

        let text = HttpExtractor::new()
            .extract(&format!("{}/electronics", server.uri()))
            .await
            .unwrap();
        assert_eq!(text, "Electronic devices process electrical signals.");
    }

    #[tokio::test]
    async fn test_extract_plain_text_is_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notes.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("line one\n<b>line two</b>\n"))
            .mount(&server)
            .await;

        let text = HttpExtractor::new()
            .extract(&format!("{}/notes.txt", server.uri()))
            .await
            .unwrap();
        assert_eq!(text, "line one\n<b>line two</b>");
    }

    #[tokio::test]
    async fn test_extract_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blank"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body> </body></html>"))
            .mount(&server)
            .await;

        let extractor = HttpExtractor::new();
        assert!(matches!(
            extractor.extract(&format!("{}/private", server.uri())).await,
            Err(ExtractionError::Unreachable { .. })
        ));
        assert!(matches!(
            extractor.extract(&format!("{}/blank", server.uri())).await,
            Err(ExtractionError::Empty(_))
        ));
        assert!(matches!(
            extractor.extract("not a url").await,
            Err(ExtractionError::InvalidUrl(_))
        ));
        assert!(matches!(
            extractor.extract("https://example.com/report.docx").await,
            Err(ExtractionError::UnsupportedFormat(ext)) if ext == "docx"
        ));
    }
}
