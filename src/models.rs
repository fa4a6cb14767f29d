//! Raw upstream shapes for one catalog group: the product listing and the price
//! listing. Both feeds are loosely typed, so every scalar is read leniently and
//! anything unreadable degrades to `None` instead of failing the whole listing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque upstream product identifier. Arrives as a JSON string or integer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        match value_as_string(&raw) {
            Some(s) => Ok(ProductId(s)),
            None => Err(serde::de::Error::custom(format!(
                "productId must be a string or integer, got {raw}"
            ))),
        }
    }
}

/// One `{name, displayName, value}` fact from a product's `extendedData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedEntry {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub value: Option<String>,
}

impl ExtendedEntry {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            display_name: None,
            value: Some(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub clean_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub rarity: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub card_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub cost: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub power: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub counter: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub life: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub attribute: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub subtype: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub sub_type_name: Option<String>,
    #[serde(default, deserialize_with = "de_extended")]
    pub extended_data: Vec<ExtendedEntry>,
}

impl RawProduct {
    pub fn new(product_id: impl Into<ProductId>, name: &str) -> Self {
        Self {
            product_id: product_id.into(),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_extended(mut self, name: &str, value: &str) -> Self {
        self.extended_data.push(ExtendedEntry::new(name, value));
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPrice {
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub sub_type_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub low_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub mid_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub high_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub market_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub direct_low_price: Option<f64>,
}

impl RawPrice {
    pub fn new(product_id: impl Into<ProductId>, sub_type_name: &str) -> Self {
        Self {
            product_id: product_id.into(),
            sub_type_name: Some(sub_type_name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_market(mut self, market_price: f64) -> Self {
        self.market_price = Some(market_price);
        self
    }
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_as_f64(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n).filter(|n| n.is_finite());
    }
    v.as_str()
        .and_then(|s| s.trim().trim_start_matches('$').replace(',', "").parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(value_as_string))
}

fn de_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(value_as_f64))
}

// Entries with a bad shape are dropped here; the extractor skips empty ones later.
fn de_extended<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ExtendedEntry>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = raw else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ExtendedEntry>(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_id_accepts_string_or_integer() {
        let a: RawPrice = serde_json::from_value(json!({"productId": 453100})).unwrap();
        let b: RawPrice = serde_json::from_value(json!({"productId": " 453100 "})).unwrap();
        assert_eq!(a.product_id, b.product_id);
        assert_eq!(a.product_id.as_str(), "453100");
    }

    #[test]
    fn price_fields_are_lenient() {
        let p: RawPrice = serde_json::from_value(json!({
            "productId": 1,
            "subTypeName": "Foil",
            "lowPrice": "1,204.50",
            "midPrice": null,
            "marketPrice": 2.5,
            "directLowPrice": "n/a"
        }))
        .unwrap();
        assert_eq!(p.low_price, Some(1204.5));
        assert_eq!(p.mid_price, None);
        assert_eq!(p.high_price, None);
        assert_eq!(p.market_price, Some(2.5));
        assert_eq!(p.direct_low_price, None);
    }

    #[test]
    fn product_tolerates_odd_extended_entries() {
        let p: RawProduct = serde_json::from_value(json!({
            "productId": "7",
            "name": "Roronoa Zoro",
            "power": 5000,
            "extendedData": [
                {"name": "Number", "displayName": "Number", "value": "OP01-025"},
                "garbage",
                {"displayName": "Cost", "value": 3},
                {"name": "Description"}
            ]
        }))
        .unwrap();
        assert_eq!(p.power.as_deref(), Some("5000"));
        assert_eq!(p.extended_data.len(), 3);
        assert_eq!(p.extended_data[1].value.as_deref(), Some("3"));
        assert_eq!(p.extended_data[2].value, None);
    }

    #[test]
    fn missing_extended_data_is_empty() {
        let p: RawProduct =
            serde_json::from_value(json!({"productId": 9, "extendedData": null})).unwrap();
        assert!(p.extended_data.is_empty());
        assert_eq!(p.display_name(), "");
    }
}
