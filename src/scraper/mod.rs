pub mod listing;
pub mod menu;
pub mod normalize;

use async_trait::async_trait;
use rand::RngExt;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::browser::BrowserSession;
use crate::config::CrawlerConfig;
use crate::error::CrawlError;
use crate::models::ParentKind;

/// Joins the fields of every raw scrape token. Field order and count are a
/// contract with the normalizer; the two must change in lockstep.
pub const FIELD_DELIMITER: &str = ":::";

/// Menu token: `href:::label:::position`.
pub const MENU_TOKEN_ARITY: usize = 3;

/// Product token: `name:::price:::rating:::parentKind:::parentId`.
pub const PRODUCT_TOKEN_ARITY: usize = 5;

/// At most this many products are extracted per listing page.
pub const TOP_SELLERS_CAP: usize = 3;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable storefront abstraction. The orchestrator only ever talks to
/// this, which is also the seam the end-to-end tests script against.
#[async_trait]
pub trait CatalogSource {
    async fn start(&mut self) -> Result<(), CrawlError>;

    async fn stop(&mut self);

    /// Top sellers on the home page, as raw product tokens.
    async fn scrape_home(&self, path: &str) -> Result<Vec<String>, CrawlError>;

    /// The navigation menu at `path`, as raw menu tokens.
    async fn scrape_menu(&self, path: &str) -> Result<Vec<String>, CrawlError>;

    /// Top sellers of the department listing behind `href`, as raw product
    /// tokens carrying `parent_id`.
    async fn scrape_listing(&self, href: &str, parent_id: i64) -> Result<Vec<String>, CrawlError>;
}

// ── Storefront scraper ────────────────────────────────────────────────────────

pub struct StorefrontScraper {
    session: BrowserSession,
    base_url: Url,
    request_delay_ms: u64,
    jitter_ms: u64,
}

impl StorefrontScraper {
    pub fn new(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            session: BrowserSession::new(config.nav_timeout_ms),
            base_url: Url::parse(config.base_url.trim_end_matches('/'))?,
            request_delay_ms: config.request_delay_ms,
            jitter_ms: config.jitter_ms,
        })
    }

    /// Resolve a scraped href (usually site-relative) against the base URL.
    fn absolute(&self, href: &str) -> Result<Url, CrawlError> {
        Ok(self.base_url.join(href)?)
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = rand::rng().random_range(0..=self.jitter_ms);
        tokio::time::sleep(Duration::from_millis(self.request_delay_ms + jitter)).await;
    }

    async fn fetch(&self, href: &str) -> Result<String, CrawlError> {
        let url = self.absolute(href)?;
        self.polite_delay().await;
        debug!("GET {}", url);
        self.session.fetch(url.as_str()).await
    }
}

#[async_trait]
impl CatalogSource for StorefrontScraper {
    async fn start(&mut self) -> Result<(), CrawlError> {
        self.session.start().await
    }

    async fn stop(&mut self) {
        self.session.stop().await;
    }

    async fn scrape_home(&self, path: &str) -> Result<Vec<String>, CrawlError> {
        let html = self.fetch(path).await?;
        listing::parse_listing(&html, listing::HOME_CONTAINER, ParentKind::HomePage, None)
    }

    async fn scrape_menu(&self, path: &str) -> Result<Vec<String>, CrawlError> {
        let html = self.fetch(path).await?;
        menu::parse_menu(&html)
    }

    async fn scrape_listing(&self, href: &str, parent_id: i64) -> Result<Vec<String>, CrawlError> {
        let html = self.fetch(href).await?;
        listing::parse_listing(
            &html,
            listing::DEPARTMENT_CONTAINER,
            ParentKind::Department,
            Some(parent_id),
        )
    }
}
