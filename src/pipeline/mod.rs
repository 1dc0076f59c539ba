//! Crawl orchestrator: ties browser scraping → normalization → storage.
//!
//! ## Run shape
//!
//! `run()` walks a fixed, linear sequence: ensure tables, scrape the home
//! page top sellers, scrape the department menu, then visit every department
//! listing in scrape order. The browser is released exactly once on every
//! exit path, success or abort.
//!
//! A department whose page cannot be reached (timeout, protocol error,
//! unresolvable menu position) is recorded in the aggregate report and the
//! loop moves on; malformed scrape output or a storage failure aborts the
//! whole run. Whatever was persisted before an abort stays persisted.

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::CrawlError;
use crate::models::{Department, NavigationEntry, Product};
use crate::scraper::menu::resolve_href;
use crate::scraper::normalize::{to_categories, to_departments, to_nav_entries, to_products};
use crate::scraper::CatalogSource;
use crate::storage::{Store, Table};

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Full catalog crawl: home top sellers, departments, per-department top
    /// sellers.
    pub async fn run<S: CatalogSource>(
        &self,
        source: &mut S,
        store: &Store,
    ) -> Result<CrawlStats> {
        store.ensure_table::<Department>()?;
        store.ensure_table::<Product>()?;

        let outcome = match source.start().await {
            Ok(()) => self.crawl(source, store).await,
            Err(e) => Err(e.into()),
        };
        source.stop().await;

        match &outcome {
            Ok(stats) => info!(
                "=== Done: {} home products | {} departments | {} department products | {} unreachable ===",
                stats.home_products,
                stats.departments,
                stats.department_products,
                stats.failures.len(),
            ),
            Err(e) => error!("Crawl aborted: {:#}", e),
        }

        outcome
    }

    async fn crawl<S: CatalogSource>(&self, source: &S, store: &Store) -> Result<CrawlStats> {
        let now = Utc::now().naive_utc();
        let root_path = &self.config.crawler.root_path;
        let mut stats = CrawlStats::default();

        let products = store.table::<Product>()?;

        // ── 1. Home page top sellers ──────────────────────────────────────────
        info!("=== Step 1: Home page top sellers ===");
        let home_tokens = source.scrape_home(root_path).await?;
        let home = to_products(&home_tokens, None, now)?;
        stats.home_products = products.create_from_list(home)?.len();
        info!("{} home products persisted", stats.home_products);

        // ── 2. Department menu ────────────────────────────────────────────────
        info!("=== Step 2: Department menu ===");
        let menu_tokens = source.scrape_menu(root_path).await?;
        let entries = to_nav_entries(&menu_tokens)?;
        let departments = store
            .table::<Department>()?
            .create_from_list(to_departments(&menu_tokens, now)?)?;
        stats.departments = departments.len();
        info!("{} departments persisted", stats.departments);

        // ── 3. Per-department top sellers ─────────────────────────────────────
        // The loop drives from the scrape-time entry sequence; the records
        // carry the ids the store just assigned.
        info!(
            "=== Step 3: Department top sellers ({} departments) ===",
            departments.len()
        );
        for (entry, department) in entries.iter().zip(departments.iter()) {
            match self
                .crawl_department(source, &entries, entry, department, &products, now)
                .await
            {
                Ok(count) => stats.department_products += count,
                Err(e) => {
                    let unreachable = e
                        .downcast_ref::<CrawlError>()
                        .is_some_and(CrawlError::is_navigation_failure);
                    if !unreachable {
                        return Err(e);
                    }
                    warn!("{} (position {}): {:#}", department.name, entry.position, e);
                    stats.failures.push(DepartmentFailure {
                        position: entry.position,
                        name: department.name.clone(),
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        Ok(stats)
    }

    async fn crawl_department<S: CatalogSource>(
        &self,
        source: &S,
        entries: &[NavigationEntry],
        entry: &NavigationEntry,
        department: &Department,
        products: &Table<'_, Product>,
        now: NaiveDateTime,
    ) -> Result<usize> {
        let href = resolve_href(entries, entry.position)?;
        let tokens = source.scrape_listing(href, department.id).await?;
        let records = to_products(&tokens, Some(&department.name), now)?;
        let count = products.create_from_list(records)?.len();
        info!("{}: {} products", department.name, count);
        Ok(count)
    }

    /// Scrape one department's own navigation menu as categories and persist
    /// them linked to the department record.
    pub async fn run_categories<S: CatalogSource>(
        &self,
        source: &mut S,
        store: &Store,
        position: i64,
    ) -> Result<usize> {
        store.ensure_table::<Department>()?;
        store.ensure_table::<crate::models::Category>()?;

        let outcome = match source.start().await {
            Ok(()) => self.scrape_categories(source, store, position).await,
            Err(e) => Err(e.into()),
        };
        source.stop().await;

        match &outcome {
            Ok(count) => info!("=== Done: {} categories for position {} ===", count, position),
            Err(e) => error!("Category scrape aborted: {:#}", e),
        }

        outcome
    }

    async fn scrape_categories<S: CatalogSource>(
        &self,
        source: &S,
        store: &Store,
        position: i64,
    ) -> Result<usize> {
        let now = Utc::now().naive_utc();
        let root_path = &self.config.crawler.root_path;

        let menu_tokens = source.scrape_menu(root_path).await?;
        let entries = to_nav_entries(&menu_tokens)?;
        let entry = entries
            .iter()
            .find(|e| e.position == position)
            .ok_or(CrawlError::PositionNotFound(position))?;
        let href = entry.href.clone();

        let department = self.department_for(store, entry, now)?;

        let category_tokens = source.scrape_menu(&href).await?;
        let categories = to_categories(&category_tokens, department.id, now)?;
        let count = store
            .table::<crate::models::Category>()?
            .create_from_list(categories)?
            .len();
        info!("{}: {} categories", department.name, count);
        Ok(count)
    }

    /// The persisted department behind a navigation entry, inserting it when
    /// no earlier crawl has stored one for the same href.
    fn department_for(
        &self,
        store: &Store,
        entry: &NavigationEntry,
        now: NaiveDateTime,
    ) -> Result<Department> {
        if let Some(existing) = store
            .list_departments()?
            .into_iter()
            .find(|d| d.href == entry.href)
        {
            return Ok(existing);
        }

        store.table::<Department>()?.create(Department {
            id: 0,
            name: entry.label.clone(),
            href: entry.href.clone(),
            scraped_at: now,
        })
    }
}

// ── Crawl report ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CrawlStats {
    pub home_products: usize,
    pub departments: usize,
    pub department_products: usize,
    pub failures: Vec<DepartmentFailure>,
}

/// One department the crawl could not reach.
#[derive(Debug)]
pub struct DepartmentFailure {
    pub position: i64,
    pub name: String,
    pub reason: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
