//! Cart Metadata Encoding
//!
//! Payment-session metadata values are size limited, so the cart travels as a
//! compact `id:qty;id:qty` string. Older sessions carry a JSON array instead;
//! the decoder accepts both.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Hard ceiling on the encoded cart, in characters
pub const MAX_ENCODED_CART_LEN: usize = 500;

const ENTRY_SEPARATOR: char = ';';
const QUANTITY_SEPARATOR: char = ':';

const LEGACY_ID_FIELDS: &[&str] = &["_id", "productId", "id"];
const LEGACY_QUANTITY_FIELDS: &[&str] = &["quantity", "qty", "q"];
const LEGACY_PRICE_FIELDS: &[&str] = &["price", "unitPrice", "pricePerUnit"];

/// One cart entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Catalog reference
    pub id: String,

    /// Always at least 1
    pub quantity: u32,

    /// Unit price, only known for legacy JSON carts
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl CartItem {
    pub fn new(id: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: id.into(),
            quantity: quantity.max(1),
            price: None,
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }
}

/// Encode a cart for session metadata.
///
/// Quantities are kept while the result fits in [`MAX_ENCODED_CART_LEN`];
/// otherwise only ids are kept and the string is cut at the limit, possibly
/// inside an id.
///
/// Ids must not contain `;` or `:`. Such ids are encoded as is and split into
/// separate entries on decode.
pub fn encode_cart(items: &[CartItem]) -> String {
    if let Some(item) = items
        .iter()
        .find(|item| item.id.contains([ENTRY_SEPARATOR, QUANTITY_SEPARATOR]))
    {
        tracing::debug!(id = %item.id, "Cart id contains a separator and will not decode intact");
    }

    let full = items
        .iter()
        .map(|item| format!("{}{QUANTITY_SEPARATOR}{}", item.id, item.quantity))
        .collect::<Vec<_>>()
        .join(&ENTRY_SEPARATOR.to_string());

    if full.chars().count() <= MAX_ENCODED_CART_LEN {
        return full;
    }

    let ids_only = items
        .iter()
        .map(|item| item.id.as_str())
        .collect::<Vec<_>>()
        .join(&ENTRY_SEPARATOR.to_string());

    tracing::warn!(
        items = items.len(),
        full_len = full.chars().count(),
        "Encoded cart exceeds metadata limit, dropping quantities"
    );

    ids_only.chars().take(MAX_ENCODED_CART_LEN).collect()
}

/// Decode cart metadata. Never fails: unreadable input yields an empty cart.
pub fn decode_cart(raw: &str) -> Vec<CartItem> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        Vec::new()
    } else if trimmed.starts_with('[') {
        decode_legacy(trimmed)
    } else {
        decode_compact(trimmed)
    }
}

fn decode_compact(raw: &str) -> Vec<CartItem> {
    raw.split(ENTRY_SEPARATOR)
        .filter_map(|segment| {
            let (id, quantity) = match segment.split_once(QUANTITY_SEPARATOR) {
                Some((id, quantity)) => (id, Some(quantity)),
                None => (segment, None),
            };

            let id = id.trim();
            if id.is_empty() {
                return None;
            }

            Some(CartItem {
                id: id.to_string(),
                quantity: quantity.map_or(1, parse_quantity),
                price: None,
            })
        })
        .collect()
}

fn decode_legacy(raw: &str) -> Vec<CartItem> {
    let entries: Vec<Value> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding malformed legacy cart metadata");
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = first_field(entry, LEGACY_ID_FIELDS).and_then(value_as_id)?;

            let quantity = first_field(entry, LEGACY_QUANTITY_FIELDS).map_or(1, |v| match v {
                Value::Number(n) => n
                    .as_u64()
                    .and_then(|q| u32::try_from(q).ok())
                    .filter(|q| *q > 0)
                    .unwrap_or(1),
                Value::String(s) => parse_quantity(s),
                _ => 1,
            });

            let price = first_field(entry, LEGACY_PRICE_FIELDS).and_then(value_as_decimal);

            Some(CartItem { id, quantity, price })
        })
        .collect()
}

/// Anything but a positive integer counts as a single unit
fn parse_quantity(raw: &str) -> u32 {
    raw.trim().parse::<u32>().ok().filter(|q| *q > 0).unwrap_or(1)
}

/// First alias holding a non-empty, non-zero value
fn first_field<'a>(entry: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| entry.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        })
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_encode_compact() {
        let cart = vec![CartItem::new("abc", 2), CartItem::new("def", 1)];
        assert_eq!(encode_cart(&cart), "abc:2;def:1");
    }

    #[test]
    fn test_roundtrip_preserves_order_and_quantities() {
        let cart = vec![
            CartItem::new("65f1a2b3c4d5e6f7a8b9c0d1", 3),
            CartItem::new("65f1a2b3c4d5e6f7a8b9c0d2", 1),
            CartItem::new("65f1a2b3c4d5e6f7a8b9c0d1", 7),
        ];
        assert_eq!(decode_cart(&encode_cart(&cart)), cart);
    }

    #[test]
    fn test_encode_exactly_at_limit_keeps_quantities() {
        // "x...x:1" with a 498-char id is exactly 500 characters
        let cart = vec![CartItem::new("x".repeat(498), 1)];
        let encoded = encode_cart(&cart);
        assert_eq!(encoded.len(), MAX_ENCODED_CART_LEN);
        assert!(encoded.ends_with(":1"));
    }

    #[test]
    fn test_encode_degrades_to_ids_only() {
        let cart: Vec<CartItem> = (0..40)
            .map(|i| CartItem::new(format!("65f1a2b3c4d5e6f7a8b9{i:04}"), 2))
            .collect();

        let encoded = encode_cart(&cart);
        assert!(encoded.chars().count() <= MAX_ENCODED_CART_LEN);
        assert_eq!(encoded.chars().count(), MAX_ENCODED_CART_LEN);
        assert!(!encoded.contains(':'));
        assert!(encoded.starts_with("65f1a2b3c4d5e6f7a8b90000;65f1a2b3c4d5e6f7a8b90001"));

        // Degraded carts still decode, one unit per id
        let decoded = decode_cart(&encoded);
        assert!(decoded.iter().all(|item| item.quantity == 1));
        assert_eq!(decoded[0].id, "65f1a2b3c4d5e6f7a8b90000");
    }

    #[test]
    fn test_encode_truncation_respects_char_boundaries() {
        let cart: Vec<CartItem> = (0..200).map(|_| CartItem::new("äö", 1)).collect();
        let encoded = encode_cart(&cart);
        assert_eq!(encoded.chars().count(), MAX_ENCODED_CART_LEN);
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_cart("").is_empty());
        assert!(decode_cart("   ").is_empty());
    }

    #[test]
    fn test_decode_legacy_aliases() {
        let items = decode_cart(r#"[{"productId":"abc","qty":3}]"#);
        assert_eq!(items, vec![CartItem::new("abc", 3)]);

        let items = decode_cart(
            r#"[{"_id":"p1","quantity":2,"price":19.99},{"id":"p2","q":"4","unitPrice":"5.50"},{"productId":"p3","pricePerUnit":1}]"#,
        );
        assert_eq!(
            items,
            vec![
                CartItem::new("p1", 2).with_price(dec!(19.99)),
                CartItem::new("p2", 4).with_price(dec!(5.50)),
                CartItem::new("p3", 1).with_price(dec!(1)),
            ]
        );
    }

    #[test]
    fn test_decode_legacy_empty_alias_falls_through() {
        let items = decode_cart(r#"[{"_id":"","productId":"p9","quantity":0,"qty":2}]"#);
        assert_eq!(items, vec![CartItem::new("p9", 2)]);
    }

    #[test]
    fn test_decode_legacy_drops_entries_without_id() {
        let items = decode_cart(r#"[{"qty":3},{"id":"ok"}]"#);
        assert_eq!(items, vec![CartItem::new("ok", 1)]);
    }

    #[test]
    fn test_decode_malformed_legacy_is_empty() {
        assert!(decode_cart(r#"[{"productId":"abc","qty":3}"#).is_empty());
        assert!(decode_cart("[not json").is_empty());
    }

    #[test]
    fn test_decode_compact_edge_cases() {
        let items = decode_cart("a:2;;b;:5; c :x;d:0;e:-3;f:1.5");
        assert_eq!(
            items,
            vec![
                CartItem::new("a", 2),
                CartItem::new("b", 1),
                CartItem::new("c", 1),
                CartItem::new("d", 1),
                CartItem::new("e", 1),
                CartItem::new("f", 1),
            ]
        );
    }

    #[test]
    fn test_decode_compact_missing_quantity() {
        assert_eq!(decode_cart("a:"), vec![CartItem::new("a", 1)]);
        assert_eq!(decode_cart("a"), vec![CartItem::new("a", 1)]);
    }

    #[test]
    fn test_separator_in_id_splits_on_decode() {
        let cart = vec![CartItem::new("a;b", 2)];
        let encoded = encode_cart(&cart);
        assert_eq!(encoded, "a;b:2");
        assert_eq!(
            decode_cart(&encoded),
            vec![CartItem::new("a", 1), CartItem::new("b", 2)]
        );
    }
}
