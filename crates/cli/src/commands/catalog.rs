//! Catalog browsing commands.

use pzafira_core::{FilterState, Price};
use pzafira_storefront::Storefront;
use pzafira_storefront::catalog::{Facets, Product, ShopView};

use super::{CommandError, emit};

/// What `products` should show.
#[derive(Debug, Default)]
pub struct ProductQuery {
    pub audience: Option<String>,
    pub page: u32,
    pub search: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
}

impl ProductQuery {
    fn filters(&self) -> FilterState {
        FilterState {
            category: self.category.clone(),
            brand: self.brand.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
        }
    }
}

/// List the products of one page that pass the filters.
///
/// Persisted products are listed when the page cannot be loaded.
///
/// # Errors
///
/// Returns the load error after listing whatever could be shown.
pub async fn products(storefront: &Storefront, query: ProductQuery) -> Result<(), CommandError> {
    let shop = storefront.shop();
    let loaded = open_page(shop, query.audience.clone(), query.page).await;

    shop.set_filters(query.filters());
    shop.set_search(query.search.clone().unwrap_or_default());

    let visible = shop.visible();
    for product in &visible {
        emit(&product_row(product));
    }
    emit(&format!(
        "{} of {} shown (page {} of {}){}",
        visible.len(),
        shop.products().len(),
        query.page.max(1),
        shop.page_count().max(1),
        if shop.is_from_cache() { ", cached" } else { "" }
    ));

    loaded
}

/// Show category, brand and price options of one page.
///
/// # Errors
///
/// Returns the load error after showing facets of whatever could be shown.
pub async fn facets(
    storefront: &Storefront,
    audience: Option<String>,
    page: u32,
) -> Result<(), CommandError> {
    let shop = storefront.shop();
    let loaded = open_page(shop, audience, page).await;

    for line in facet_lines(&shop.facets()) {
        emit(&line);
    }
    loaded
}

/// Load the first page for `audience`, then follow `next` links to `page`.
async fn open_page(shop: &ShopView, audience: Option<String>, page: u32) -> Result<(), CommandError> {
    if audience.is_some() {
        shop.set_target_audience(audience).await?;
    } else {
        shop.load().await?;
    }
    for _ in 1..page {
        if !shop.next_page().await? {
            break;
        }
    }
    Ok(())
}

fn product_row(product: &Product) -> String {
    format!(
        "{:>6}  {:<32}  {:<16}  {:<16}  {}",
        product.id.as_i64(),
        product.name,
        product.brand_label().unwrap_or_default(),
        product.category_label().unwrap_or_default(),
        product
            .display_price()
            .map_or_else(|| "-".to_string(), |price| price.to_string())
    )
}

fn facet_lines(facets: &Facets) -> Vec<String> {
    vec![
        format!("categories: {}", facets.categories.join(", ")),
        format!("brands:     {}", facets.brands.join(", ")),
        format!("price:      {} - {}", facets.min_price(), facets.max_price()),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pzafira_core::PriceRange;

    use super::*;

    #[test]
    fn test_query_filters() {
        let query = ProductQuery {
            brand: Some("Nike".to_string()),
            max_price: Some(Price::from_units(1500)),
            ..ProductQuery::default()
        };
        let filters = query.filters();
        assert_eq!(filters.brand.as_deref(), Some("Nike"));
        assert_eq!(filters.max_price, Some(Price::from_units(1500)));
        assert!(filters.category.is_none());
    }

    #[test]
    fn test_facet_lines() {
        let facets = Facets {
            categories: vec!["Shoes".to_string()],
            brands: vec!["Nike".to_string(), "Adidas".to_string()],
            price: PriceRange::new(Price::from_units(500), Price::from_units(1500)),
        };
        let lines = facet_lines(&facets);
        assert_eq!(lines[1], "brands:     Nike, Adidas");
        assert!(lines[2].contains("500.00"));
    }

    #[test]
    fn test_product_row_without_price() {
        let product: Product = serde_json::from_str(r#"{"id": 3, "name": "Plain"}"#).unwrap();
        assert!(product_row(&product).ends_with('-'));
    }
}
