use thiserror::Error;

/// Errors raised by the crawl pipeline.
///
/// Extraction and resolution errors propagate uncaught up to the
/// orchestrator, which is the single recovery boundary.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Browser could not be launched: {0}")]
    BrowserUnavailable(String),

    #[error("Browser session not started")]
    SessionNotInitialized,

    #[error("Navigation to {url} did not finish within {timeout_ms} ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("No navigation entry at position {0}")]
    PositionNotFound(i64),

    #[error("Malformed scrape token {token:?}: {detail}")]
    MalformedToken { token: String, detail: String },

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("URL error: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

impl CrawlError {
    /// True for failures that mean "this page could not be reached", as
    /// opposed to contract drift in the extracted data. The department loop
    /// tolerates these per branch; everything else aborts the run.
    pub fn is_navigation_failure(&self) -> bool {
        matches!(
            self,
            CrawlError::NavigationTimeout { .. }
                | CrawlError::PositionNotFound(_)
                | CrawlError::Cdp(_)
        )
    }

    pub(crate) fn malformed(token: &str, detail: impl Into<String>) -> Self {
        CrawlError::MalformedToken {
            token: token.to_string(),
            detail: detail.into(),
        }
    }
}
