//! Navigation-menu extraction.
//!
//! The storefront renders its department list as a tree widget. Each tree
//! item wrapping a link becomes one menu token; the position field is
//! assigned over the *emitted* entries, so discarded nodes never leave holes
//! in the numbering.

use scraper::{Html, Selector};

use super::FIELD_DELIMITER;
use crate::error::CrawlError;
use crate::models::NavigationEntry;

const TREE_ITEM: &str = r#"[role="treeitem"]"#;

fn selector(s: &str) -> Result<Selector, CrawlError> {
    Selector::parse(s).map_err(|e| CrawlError::Selector(format!("{s}: {e:?}")))
}

/// Scrape every linked tree item out of `html` into menu tokens
/// (`href:::label:::position`, positions 1-based and contiguous).
///
/// Items without a link, or whose link is missing an href or a non-empty
/// label, are discarded rather than emitted with empty fields.
pub fn parse_menu(html: &str) -> Result<Vec<String>, CrawlError> {
    let doc = Html::parse_document(html);
    let item_sel = selector(TREE_ITEM)?;
    let anchor_sel = selector("a")?;

    let mut tokens = Vec::new();

    for item in doc.select(&item_sel) {
        let Some(anchor) = item.select(&anchor_sel).next() else {
            continue;
        };

        let href = anchor.value().attr("href").map(str::trim).unwrap_or("");
        let label = anchor.text().collect::<String>();
        let label = label.trim();

        if href.is_empty() || label.is_empty() {
            continue;
        }

        let position = tokens.len() + 1;
        tokens.push(format!(
            "{href}{FIELD_DELIMITER}{label}{FIELD_DELIMITER}{position}"
        ));
    }

    Ok(tokens)
}

/// Look up the navigation target for a scrape-time position.
///
/// Positions are only meaningful against the entry sequence they were
/// assigned in; a miss means that branch of the crawl has no target and
/// cannot proceed.
pub fn resolve_href(entries: &[NavigationEntry], position: i64) -> Result<&str, CrawlError> {
    entries
        .iter()
        .find(|entry| entry.position == position)
        .map(|entry| entry.href.as_str())
        .ok_or(CrawlError::PositionNotFound(position))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MENU_HTML: &str = r##"
        <html><body><ul>
            <li role="treeitem"><a href="/dept/electronics"> Electronics </a></li>
            <li role="treeitem"><span>No link here</span></li>
            <li role="treeitem"><a href="/dept/books">Books</a></li>
            <li role="treeitem"><a href="/dept/ghost">   </a></li>
            <li role="treeitem"><a href="">Missing href</a></li>
            <li role="treeitem"><a href="/dept/toys">Toys &amp; Games</a></li>
        </ul></body></html>
    "##;

    fn entry(href: &str, label: &str, position: i64) -> NavigationEntry {
        NavigationEntry {
            href: href.to_string(),
            label: label.to_string(),
            position,
        }
    }

    #[test]
    fn positions_are_contiguous_over_emitted_entries() {
        let tokens = parse_menu(MENU_HTML).unwrap();

        assert_eq!(
            tokens,
            vec![
                "/dept/electronics:::Electronics:::1",
                "/dept/books:::Books:::2",
                "/dept/toys:::Toys & Games:::3",
            ]
        );
    }

    #[test]
    fn empty_document_yields_no_tokens() {
        let tokens = parse_menu("<html><body></body></html>").unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn resolve_returns_matching_href() {
        let entries = vec![
            entry("/dept/electronics", "Electronics", 1),
            entry("/dept/books", "Books", 2),
        ];

        assert_eq!(resolve_href(&entries, 2).unwrap(), "/dept/books");
    }

    #[test]
    fn resolve_misses_are_not_silent() {
        let entries = vec![entry("/dept/electronics", "Electronics", 1)];

        let err = resolve_href(&entries, 7).unwrap_err();
        assert!(matches!(err, CrawlError::PositionNotFound(7)));
        assert!(err.is_navigation_failure());
    }
}
