use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `parent_id` stored for products scraped off the home page, which has no
/// department parent.
pub const HOME_PARENT_ID: i64 = -1;

// ── Navigation entry ──────────────────────────────────────────────────────────

/// One clickable menu item plus its scrape-time position.
///
/// `position` is 1-based document order over the emitted entries of a single
/// menu scrape. It is not a stable identifier; it only means something for
/// the lifetime of that scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    pub href: String,
    pub label: String,
    pub position: i64,
}

// ── Parent kind ───────────────────────────────────────────────────────────────

/// Which page a product listing was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    HomePage,
    Department,
}

impl ParentKind {
    pub fn label(self) -> &'static str {
        match self {
            ParentKind::HomePage => "Home Page",
            ParentKind::Department => "Department",
        }
    }
}

impl fmt::Display for ParentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Department ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Department {
    /// Assigned by the store at insertion time; 0 until then.
    pub id: i64,
    pub name: String,
    pub href: String,
    pub scraped_at: NaiveDateTime,
}

// ── Category ──────────────────────────────────────────────────────────────────

/// A sub-menu entry of one department's navigation tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub href: String,
    pub department_id: i64,
    pub scraped_at: NaiveDateTime,
}

// ── Product ───────────────────────────────────────────────────────────────────

/// A single top-seller entry. Price and rating stay as the on-page text;
/// currency and locale formatting belong to the storefront, not to us.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: String,
    pub rating: String,
    /// `"Home Page"`, or `"Department : <name>"` once the normalizer has the
    /// parent department's name.
    pub parent_kind: String,
    /// [`HOME_PARENT_ID`] for home-page listings.
    pub parent_id: i64,
    pub scraped_at: NaiveDateTime,
}
