use serde::{Deserialize, Serialize};

use crate::models::{ProductId, RawPrice};
use crate::normalization::metadata::CardMetadata;
use crate::normalization::variant::VariantIdentity;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFields {
    pub low_price: Option<f64>,
    pub mid_price: Option<f64>,
    pub high_price: Option<f64>,
    pub market_price: Option<f64>,
    pub direct_low_price: Option<f64>,
}

impl From<&RawPrice> for PriceFields {
    fn from(p: &RawPrice) -> Self {
        Self {
            low_price: p.low_price,
            mid_price: p.mid_price,
            high_price: p.high_price,
            market_price: p.market_price,
            direct_low_price: p.direct_low_price,
        }
    }
}

/// One output row per card variant in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub card_id: String,
    pub base_number: String,
    pub variant: String,
    pub product_id: ProductId,
    pub group_id: i64,
    /// Subtype of the joined price row; `null` for unpriced records.
    pub sub_type_name: Option<String>,
    #[serde(flatten)]
    pub metadata: CardMetadata,
    #[serde(flatten)]
    pub prices: PriceFields,
}

impl CardRecord {
    pub fn new(
        identity: &VariantIdentity,
        product_id: &ProductId,
        group_id: i64,
        metadata: &CardMetadata,
        price: Option<&RawPrice>,
    ) -> Self {
        Self {
            card_id: identity.key(),
            base_number: identity.base_number.clone(),
            variant: identity.tag.label().to_string(),
            product_id: product_id.clone(),
            group_id,
            sub_type_name: price.and_then(|p| p.sub_type_name.clone()),
            metadata: metadata.clone(),
            prices: price.map(PriceFields::from).unwrap_or_default(),
        }
    }

    pub fn is_priced(&self) -> bool {
        self.sub_type_name.is_some() || self.prices != PriceFields::default()
    }
}
