//! Canonical line-item requests.
//!
//! Clients name products and sizes in several shapes (`productId` or
//! `product`, `sizeId`, `size` as a string or as an object carrying `size`,
//! `sizeLabel`). [`normalize_item`] maps all of them onto [`ItemRequest`]
//! so nothing past this point has to care.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::SizeSelector;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRequest {
    pub product_id: Uuid,
    pub size: Option<SizeSelector>,
    pub quantity: i64,
}

pub fn normalize_items(values: &[Value]) -> Result<Vec<ItemRequest>, AppError> {
    values.iter().map(normalize_item).collect()
}

pub fn normalize_item(value: &Value) -> Result<ItemRequest, AppError> {
    let obj = value.as_object().ok_or_else(|| AppError::validation("Each item must be an object"))?;

    let product_id = ["productId", "product"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(reference_id))
        .ok_or_else(|| AppError::validation("Item is missing a valid productId"))?;

    let size = ["sizeId", "size", "sizeLabel"].iter().find_map(|k| obj.get(*k).and_then(size_selector));

    let quantity = match obj.get("quantity") {
        None | Some(Value::Null) => 1,
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| AppError::validation("quantity must be an integer"))?,
        Some(Value::String(s)) => {
            s.trim().parse().map_err(|_| AppError::validation("quantity must be an integer"))?
        }
        Some(_) => return Err(AppError::validation("quantity must be an integer")),
    };

    Ok(ItemRequest { product_id, size, quantity })
}

/// An id given directly or as a populated object with `_id`/`id`.
fn reference_id(value: &Value) -> Option<Uuid> {
    match value {
        Value::String(s) => Uuid::parse_str(s.trim()).ok(),
        Value::Object(map) => id_field(map).and_then(reference_id),
        _ => None,
    }
}

fn id_field(map: &Map<String, Value>) -> Option<&Value> {
    map.get("_id").or_else(|| map.get("id"))
}

fn size_selector(value: &Value) -> Option<SizeSelector> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else if let Ok(id) = Uuid::parse_str(s) {
                Some(SizeSelector::ById(id))
            } else {
                Some(SizeSelector::ByLabel(s.to_string()))
            }
        }
        Value::Object(map) => map
            .get("size")
            .or_else(|| map.get("label"))
            .or_else(|| id_field(map))
            .and_then(size_selector),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_every_product_and_size_shape() {
        let p = Uuid::new_v4();
        let s = Uuid::new_v4();

        let a = normalize_item(&json!({"productId": p.to_string(), "sizeId": s.to_string(), "quantity": 2})).unwrap();
        let b = normalize_item(&json!({
            "product": {"_id": p.to_string()},
            "size": {"size": s.to_string()},
            "quantity": "2"
        }))
            .unwrap();
        let c = normalize_item(&json!({"product": p.to_string(), "size": s.to_string(), "quantity": 2})).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.size, Some(SizeSelector::ById(s)));
    }

    #[test]
    fn labels_and_defaults() {
        let p = Uuid::new_v4();
        let item = normalize_item(&json!({"productId": p.to_string(), "size": "XL"})).unwrap();
        assert_eq!(item.size, Some(SizeSelector::ByLabel("XL".into())));
        assert_eq!(item.quantity, 1);

        let item = normalize_item(&json!({"productId": p.to_string(), "size": {"size": "M"}})).unwrap();
        assert_eq!(item.size, Some(SizeSelector::ByLabel("M".into())));

        let item = normalize_item(&json!({"productId": p.to_string(), "size": ""})).unwrap();
        assert_eq!(item.size, None);
    }

    #[test]
    fn rejects_bad_items() {
        assert!(normalize_item(&json!("nope")).is_err());
        assert!(normalize_item(&json!({"productId": "not-a-uuid"})).is_err());
        assert!(normalize_item(&json!({"productId": Uuid::new_v4().to_string(), "quantity": 1.5})).is_err());
        assert!(normalize_items(&[json!({})]).is_err());
    }
}
