//! In-memory product listing: search, category filter and sort.

use std::cmp::Ordering;

use serde::Deserialize;

use shopfront_core::Product;

/// Category value that selects every product.
pub const ALL_CATEGORIES: &str = "all";

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// Title, A to Z.
    #[default]
    Name,
    /// Price, lowest first.
    Price,
    /// Rating, highest first.
    Rating,
}

/// Listing parameters, as accepted on `GET /api/products`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    /// Exact category; `None` or `"all"` selects everything.
    pub category: Option<String>,
    pub sort: ProductSort,
}

impl ProductQuery {
    fn matches(&self, product: &Product, needle: Option<&str>) -> bool {
        let search_ok = needle.is_none_or(|n| product.title.to_lowercase().contains(n));
        let category_ok = match self.category.as_deref() {
            None | Some(ALL_CATEGORIES) => true,
            Some(category) => product.category == category,
        };
        search_ok && category_ok
    }

    /// Filter and sort `products`. The sort is stable.
    #[must_use]
    pub fn apply(&self, products: &[Product]) -> Vec<Product> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut listing: Vec<Product> = products
            .iter()
            .filter(|p| self.matches(p, needle.as_deref()))
            .cloned()
            .collect();

        match self.sort {
            ProductSort::Name => listing.sort_by(compare_titles),
            ProductSort::Price => listing.sort_by(|a, b| a.price.cmp(&b.price)),
            ProductSort::Rating => listing.sort_by(|a, b| {
                b.rating
                    .rate
                    .partial_cmp(&a.rating.rate)
                    .unwrap_or(Ordering::Equal)
            }),
        }

        listing
    }
}

fn compare_titles(a: &Product, b: &Product) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

/// Distinct categories in first-seen order.
#[must_use]
pub fn categories(products: &[Product]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for product in products {
        if !product.category.is_empty() && !seen.contains(&product.category) {
            seen.push(product.category.clone());
        }
    }
    seen
}

/// The first `n` products, as shown on the home page.
#[must_use]
pub fn featured(products: &[Product], n: usize) -> Vec<Product> {
    products.iter().take(n).cloned().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use shopfront_core::{ProductId, Rating};

    use super::*;

    fn product(id: i64, title: &str, price: i64, category: &str, rate: f64) -> Product {
        Product {
            id: ProductId::new(id),
            title: title.to_string(),
            price: Decimal::new(price, 2),
            description: String::new(),
            category: category.to_string(),
            image: String::new(),
            rating: Rating { rate, count: 1 },
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            product(1, "Backpack", 10995, "men's clothing", 3.9),
            product(2, "slim T-shirt", 2230, "men's clothing", 4.1),
            product(3, "Gold Ring", 16800, "jewelery", 3.0),
            product(4, "Hard Drive", 6400, "electronics", 4.8),
        ]
    }

    fn ids(products: &[Product]) -> Vec<i64> {
        products.iter().map(|p| p.id.get()).collect()
    }

    #[test]
    fn test_default_sorts_by_name_case_insensitive() {
        let listing = ProductQuery::default().apply(&catalog());
        assert_eq!(ids(&listing), vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_sort_by_price_ascending() {
        let query = ProductQuery {
            sort: ProductSort::Price,
            ..ProductQuery::default()
        };
        assert_eq!(ids(&query.apply(&catalog())), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_sort_by_rating_descending() {
        let query = ProductQuery {
            sort: ProductSort::Rating,
            ..ProductQuery::default()
        };
        assert_eq!(ids(&query.apply(&catalog())), vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let query = ProductQuery {
            search: Some("  RING ".to_string()),
            ..ProductQuery::default()
        };
        assert_eq!(ids(&query.apply(&catalog())), vec![3]);
    }

    #[test]
    fn test_category_filter_and_all() {
        let query = ProductQuery {
            category: Some("men's clothing".to_string()),
            ..ProductQuery::default()
        };
        assert_eq!(ids(&query.apply(&catalog())), vec![1, 2]);

        let query = ProductQuery {
            category: Some(ALL_CATEGORIES.to_string()),
            ..ProductQuery::default()
        };
        assert_eq!(query.apply(&catalog()).len(), 4);
    }

    #[test]
    fn test_categories_first_seen_order() {
        assert_eq!(
            categories(&catalog()),
            vec!["men's clothing", "jewelery", "electronics"]
        );
    }

    #[test]
    fn test_featured_takes_first_n() {
        assert_eq!(ids(&featured(&catalog(), 3)), vec![1, 2, 3]);
        assert_eq!(featured(&catalog(), 10).len(), 4);
    }

    #[test]
    fn test_query_from_url_params() {
        let query: ProductQuery =
            serde_json::from_str(r#"{"search":"drive","sort":"price"}"#).unwrap();
        assert_eq!(query.sort, ProductSort::Price);
        assert_eq!(query.category, None);
    }
}
