//! Order Reconciliation
//!
//! Resolves decoded cart entries against the live catalog to fix the price
//! and product reference of every order line.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

use crate::cart::CartItem;
use crate::error::Result;
use crate::model::{OrderLine, Product};
use crate::store::CatalogStore;

/// Order lines resolved against the catalog
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    /// One line per cart entry, in cart order
    pub lines: Vec<OrderLine>,

    /// Cart ids with no catalog match, first-seen order
    pub missing: Vec<String>,
}

impl Reconciliation {
    /// Whether a line's product was found in the catalog
    pub fn is_resolved(&self, line: &OrderLine) -> bool {
        !self.missing.iter().any(|id| *id == line.product)
    }
}

/// Cart ids without repeats, in first-seen order
pub fn unique_ids(items: &[CartItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.id.as_str()))
        .map(|item| item.id.clone())
        .collect()
}

/// Build order lines for `items` using catalog prices.
///
/// Unit price falls back to the price embedded in the cart entry, then to
/// zero. A product missing from the catalog keeps its raw cart id as the
/// line's reference.
pub async fn reconcile(catalog: &dyn CatalogStore, items: &[CartItem]) -> Result<Reconciliation> {
    let ids = unique_ids(items);

    let products: HashMap<String, Product> = if ids.is_empty() {
        HashMap::new()
    } else {
        catalog
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect()
    };

    let lines = items
        .iter()
        .map(|item| match products.get(&item.id) {
            Some(product) => OrderLine {
                product: product.id.clone(),
                quantity: item.quantity,
                price: product.price,
            },
            None => OrderLine {
                product: item.id.clone(),
                quantity: item.quantity,
                price: item.price.unwrap_or(Decimal::ZERO),
            },
        })
        .collect();

    let missing: Vec<String> = ids
        .into_iter()
        .filter(|id| !products.contains_key(id))
        .collect();

    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "Cart references products not in the catalog");
    }

    Ok(Reconciliation { lines, missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCatalog;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::with_products([
            Product::new("p1", "Sneakers", dec!(89.99), 10),
            Product::new("p2", "Cap", dec!(15), 10),
        ])
    }

    #[test]
    fn test_unique_ids_preserve_first_seen_order() {
        let items = vec![
            CartItem::new("b", 1),
            CartItem::new("a", 1),
            CartItem::new("b", 2),
        ];
        assert_eq!(unique_ids(&items), vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_catalog_price_wins() {
        let items = vec![CartItem::new("p1", 2).with_price(dec!(1))];
        let result = reconcile(&catalog(), &items).await.unwrap();

        assert_eq!(result.lines[0].price, dec!(89.99));
        assert_eq!(result.lines[0].quantity, 2);
        assert!(result.missing.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_pricing_for_missing_products() {
        let items = vec![
            CartItem::new("gone", 1).with_price(dec!(42.50)),
            CartItem::new("p2", 3),
            CartItem::new("also-gone", 4),
        ];
        let result = reconcile(&catalog(), &items).await.unwrap();

        assert_eq!(
            result.lines,
            vec![
                OrderLine { product: "gone".into(), quantity: 1, price: dec!(42.50) },
                OrderLine { product: "p2".into(), quantity: 3, price: dec!(15) },
                OrderLine { product: "also-gone".into(), quantity: 4, price: Decimal::ZERO },
            ]
        );
        assert_eq!(result.missing, vec!["gone".to_string(), "also-gone".to_string()]);
        assert!(!result.is_resolved(&result.lines[0]));
        assert!(result.is_resolved(&result.lines[1]));
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_separate_lines() {
        let items = vec![CartItem::new("p1", 1), CartItem::new("p1", 2)];
        let result = reconcile(&catalog(), &items).await.unwrap();
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[1].quantity, 2);
    }

    struct CountingCatalog(AtomicUsize);

    #[async_trait]
    impl CatalogStore for CountingCatalog {
        async fn find_by_ids(&self, _ids: &[String]) -> Result<Vec<Product>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_empty_cart_skips_catalog() {
        let counting = CountingCatalog(AtomicUsize::new(0));
        let result = reconcile(&counting, &[]).await.unwrap();

        assert!(result.lines.is_empty());
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);
    }
}
