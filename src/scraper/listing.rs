//! Product-listing extraction.
//!
//! The storefront renders its top-seller widgets from several templates
//! whose product-name markup differs. Rather than branching the caller on
//! template, each container is read through an ordered chain of candidate
//! selectors: the first candidate with non-empty text wins, and when none
//! match the name falls back to the `"N/A"` sentinel. Callers always get
//! uniformly shaped tokens back, whichever template rendered the page.

use scraper::{ElementRef, Html, Selector};

use super::{FIELD_DELIMITER, TOP_SELLERS_CAP};
use crate::error::CrawlError;
use crate::models::ParentKind;

/// Home-page top sellers live in a carousel.
pub const HOME_CONTAINER: &str = ".a-carousel-card";

/// Department listings render a bestseller grid.
pub const DEPARTMENT_CONTAINER: &str = "#gridItemRoot";

/// Placeholder for fields the page did not yield. A sentinel, not a parse
/// failure: extraction stays lossless with respect to missing markup.
pub const MISSING_FIELD: &str = "N/A";

const RATING_SELECTOR: &str = ".a-icon-alt";
const PRICE_SELECTOR: &str = "._cDEzb_p13n-sc-price_3mJ9Z";

// Name candidates, most specific first. The home carousel uses its own
// truncation class; the grid templates vary only in line-clamp depth.
const HOME_NAME_CHAIN: [&str; 5] = [
    ".p13n-sc-truncate-desktop-type2",
    "._cDEzb_p13n-sc-css-line-clamp-2_EWgCb",
    "._cDEzb_p13n-sc-css-line-clamp-3_g3dy1",
    "._cDEzb_p13n-sc-css-line-clamp-1_1Fn1y",
    "._cDEzb_p13n-sc-css-line-clamp-4_2q2cc",
];

const DEPARTMENT_NAME_CHAIN: [&str; 4] = [
    "._cDEzb_p13n-sc-css-line-clamp-2_EWgCb",
    "._cDEzb_p13n-sc-css-line-clamp-3_g3dy1",
    "._cDEzb_p13n-sc-css-line-clamp-1_1Fn1y",
    "._cDEzb_p13n-sc-css-line-clamp-4_2q2cc",
];

fn name_chain(parent_kind: ParentKind) -> &'static [&'static str] {
    match parent_kind {
        ParentKind::HomePage => &HOME_NAME_CHAIN,
        ParentKind::Department => &DEPARTMENT_NAME_CHAIN,
    }
}

fn selector(s: &str) -> Result<Selector, CrawlError> {
    Selector::parse(s).map_err(|e| CrawlError::Selector(format!("{s}: {e:?}")))
}

/// First non-empty trimmed text under any of `candidates`, else the sentinel.
fn text_via_chain(container: ElementRef<'_>, candidates: &[&str]) -> String {
    for candidate in candidates {
        let Ok(sel) = Selector::parse(candidate) else {
            continue;
        };
        if let Some(el) = container.select(&sel).next() {
            let text = el.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    MISSING_FIELD.to_string()
}

fn text_via(container: ElementRef<'_>, sel: &Selector) -> String {
    container
        .select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| MISSING_FIELD.to_string())
}

/// Extract up to [`TOP_SELLERS_CAP`] product tokens from `html`.
///
/// Containers are matched by `container_selector` and taken in document
/// order. Each yields one `name:::price:::rating:::parentKind:::parentId`
/// token; a `None` parent id renders as the literal `null` (the home page
/// has no department parent).
pub fn parse_listing(
    html: &str,
    container_selector: &str,
    parent_kind: ParentKind,
    parent_id: Option<i64>,
) -> Result<Vec<String>, CrawlError> {
    let doc = Html::parse_document(html);
    let container_sel = selector(container_selector)?;
    let rating_sel = selector(RATING_SELECTOR)?;
    let price_sel = selector(PRICE_SELECTOR)?;

    let parent_id_field = match parent_id {
        Some(id) => id.to_string(),
        None => "null".to_string(),
    };

    let tokens = doc
        .select(&container_sel)
        .take(TOP_SELLERS_CAP)
        .map(|container| {
            let name = text_via_chain(container, name_chain(parent_kind));
            let price = text_via(container, &price_sel);
            let rating = text_via(container, &rating_sel);

            [
                name.as_str(),
                price.as_str(),
                rating.as_str(),
                parent_kind.label(),
                parent_id_field.as_str(),
            ]
            .join(FIELD_DELIMITER)
        })
        .collect();

    Ok(tokens)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_item(body: &str) -> String {
        format!(r#"<div id="gridItemRoot">{body}</div>"#)
    }

    #[test]
    fn caps_extraction_at_three_containers() {
        let html = format!(
            "<html><body>{}</body></html>",
            (1..=5)
                .map(|i| format!(
                    r#"<div class="a-carousel-card">
                        <span class="p13n-sc-truncate-desktop-type2">Item {i}</span>
                        <span class="_cDEzb_p13n-sc-price_3mJ9Z">$ {i}.00</span>
                        <span class="a-icon-alt">{i} stars</span>
                    </div>"#
                ))
                .collect::<String>()
        );

        let tokens = parse_listing(&html, HOME_CONTAINER, ParentKind::HomePage, None).unwrap();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], "Item 1:::$ 1.00:::1 stars:::Home Page:::null");
        assert_eq!(tokens[2], "Item 3:::$ 3.00:::3 stars:::Home Page:::null");
    }

    #[test]
    fn name_fallsback_through_the_selector_chain() {
        // Only the third department candidate is present.
        let html = grid_item(
            r#"<span class="_cDEzb_p13n-sc-css-line-clamp-1_1Fn1y">Clamped Name</span>
               <span class="_cDEzb_p13n-sc-price_3mJ9Z">$ 9.99</span>"#,
        );

        let tokens =
            parse_listing(&html, DEPARTMENT_CONTAINER, ParentKind::Department, Some(4)).unwrap();

        assert_eq!(tokens, vec!["Clamped Name:::$ 9.99:::N/A:::Department:::4"]);
    }

    #[test]
    fn empty_candidates_are_skipped_not_taken() {
        // First candidate matches but is blank; the next one holds the text.
        let html = grid_item(
            r#"<span class="_cDEzb_p13n-sc-css-line-clamp-2_EWgCb">  </span>
               <span class="_cDEzb_p13n-sc-css-line-clamp-3_g3dy1">Real Name</span>"#,
        );

        let tokens =
            parse_listing(&html, DEPARTMENT_CONTAINER, ParentKind::Department, Some(1)).unwrap();

        assert!(tokens[0].starts_with("Real Name:::"));
    }

    #[test]
    fn exhausted_chain_yields_sentinel_name() {
        let html = grid_item(r#"<span class="a-icon-alt">4.5 out of 5 stars</span>"#);

        let tokens =
            parse_listing(&html, DEPARTMENT_CONTAINER, ParentKind::Department, Some(2)).unwrap();

        assert_eq!(
            tokens,
            vec!["N/A:::N/A:::4.5 out of 5 stars:::Department:::2"]
        );
    }

    #[test]
    fn home_primary_selector_only_applies_to_home_layout() {
        let body = r#"<span class="p13n-sc-truncate-desktop-type2">Carousel Name</span>"#;
        let home_html = format!(r#"<div class="a-carousel-card">{body}</div>"#);
        let dept_html = grid_item(body);

        let home =
            parse_listing(&home_html, HOME_CONTAINER, ParentKind::HomePage, None).unwrap();
        let dept =
            parse_listing(&dept_html, DEPARTMENT_CONTAINER, ParentKind::Department, Some(1))
                .unwrap();

        assert!(home[0].starts_with("Carousel Name:::"));
        // The carousel-only class is not in the department chain.
        assert!(dept[0].starts_with("N/A:::"));
    }

    #[test]
    fn no_matching_containers_yield_no_tokens() {
        let tokens = parse_listing(
            "<html><body><p>nothing for sale</p></body></html>",
            DEPARTMENT_CONTAINER,
            ParentKind::Department,
            Some(1),
        )
        .unwrap();

        assert!(tokens.is_empty());
    }
}
