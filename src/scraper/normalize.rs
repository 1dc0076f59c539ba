//! Token normalization: raw delimited scrape output into typed records.
//!
//! Field order and arity are a contract with the extractors. Drift in either
//! direction means the page markup or the extractor changed underneath us,
//! and is rejected as [`CrawlError::MalformedToken`] instead of being
//! coerced into half-parsed records.

use chrono::NaiveDateTime;

use super::{FIELD_DELIMITER, MENU_TOKEN_ARITY, PRODUCT_TOKEN_ARITY};
use crate::error::CrawlError;
use crate::models::{Category, Department, NavigationEntry, Product, HOME_PARENT_ID};

fn split_checked<'t>(token: &'t str, arity: usize) -> Result<Vec<&'t str>, CrawlError> {
    let fields: Vec<&str> = token.split(FIELD_DELIMITER).collect();
    if fields.len() != arity {
        return Err(CrawlError::malformed(
            token,
            format!("expected {} fields, found {}", arity, fields.len()),
        ));
    }
    Ok(fields)
}

/// Parse menu tokens into typed navigation entries.
///
/// This is the one place the position field is converted to an integer;
/// every later comparison is integer against integer.
pub fn to_nav_entries(tokens: &[String]) -> Result<Vec<NavigationEntry>, CrawlError> {
    tokens
        .iter()
        .map(|token| {
            let fields = split_checked(token, MENU_TOKEN_ARITY)?;
            let position: i64 = fields[2].parse().map_err(|_| {
                CrawlError::malformed(token, format!("position {:?} is not an integer", fields[2]))
            })?;

            Ok(NavigationEntry {
                href: fields[0].to_string(),
                label: fields[1].to_string(),
                position,
            })
        })
        .collect()
}

/// Menu tokens → department records. Ids are left to the store; the
/// scrape-time position is deliberately not carried into the durable record.
pub fn to_departments(
    tokens: &[String],
    now: NaiveDateTime,
) -> Result<Vec<Department>, CrawlError> {
    Ok(to_nav_entries(tokens)?
        .into_iter()
        .map(|entry| Department {
            id: 0,
            name: entry.label,
            href: entry.href,
            scraped_at: now,
        })
        .collect())
}

/// Menu tokens scraped off one department's page → category records.
pub fn to_categories(
    tokens: &[String],
    department_id: i64,
    now: NaiveDateTime,
) -> Result<Vec<Category>, CrawlError> {
    Ok(to_nav_entries(tokens)?
        .into_iter()
        .map(|entry| Category {
            id: 0,
            name: entry.label,
            href: entry.href,
            department_id,
            scraped_at: now,
        })
        .collect())
}

/// Product tokens → product records.
///
/// The literal `null` in the parent-id field is the home-page marker and
/// becomes [`HOME_PARENT_ID`]; anything else must parse as an integer. When
/// `parent_name` is given it is folded into the stored kind label
/// (`"Department : Books"`), so downstream reads get a human-readable parent
/// tag without a join.
pub fn to_products(
    tokens: &[String],
    parent_name: Option<&str>,
    now: NaiveDateTime,
) -> Result<Vec<Product>, CrawlError> {
    tokens
        .iter()
        .map(|token| {
            let fields = split_checked(token, PRODUCT_TOKEN_ARITY)?;
            let (name, price, rating, kind, parent_id) =
                (fields[0], fields[1], fields[2], fields[3], fields[4]);

            let parent_id = if parent_id == "null" {
                HOME_PARENT_ID
            } else {
                parent_id.parse().map_err(|_| {
                    CrawlError::malformed(
                        token,
                        format!("parent id {parent_id:?} is not an integer"),
                    )
                })?
            };

            let parent_kind = match parent_name {
                Some(parent_name) => format!("{kind} : {parent_name}"),
                None => kind.to_string(),
            };

            let name = name.trim();
            Ok(Product {
                id: 0,
                name: if name.is_empty() {
                    super::listing::MISSING_FIELD.to_string()
                } else {
                    name.to_string()
                },
                price: price.to_string(),
                rating: rating.to_string(),
                parent_kind,
                parent_id,
                scraped_at: now,
            })
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
