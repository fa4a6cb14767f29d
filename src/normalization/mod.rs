pub mod attributes;
pub mod metadata;
pub mod variant;

use crate::models::RawProduct;
use attributes::ExtendedAttributes;
use metadata::{project_metadata, CardMetadata};
use variant::{resolve_base_number, resolve_variant_tag, BaseSource, VariantIdentity};

/// Everything derived from one product before any price row is joined.
#[derive(Debug, Clone)]
pub struct NormalizedProduct<'a> {
    pub raw: &'a RawProduct,
    pub attrs: ExtendedAttributes,
    /// `None` when no catalog number could be found.
    pub base: Option<(String, BaseSource)>,
    pub metadata: CardMetadata,
}

impl<'a> NormalizedProduct<'a> {
    pub fn new(raw: &'a RawProduct) -> Self {
        let attrs = ExtendedAttributes::from_entries(&raw.extended_data);
        let base = resolve_base_number(raw, &attrs);
        let metadata = project_metadata(raw, &attrs);
        Self {
            raw,
            attrs,
            base,
            metadata,
        }
    }

    pub fn base_number(&self) -> Option<&str> {
        self.base.as_ref().map(|(n, _)| n.as_str())
    }

    /// Identity as seen through a price row (`Some(subtype)`) or on its own (`None`).
    pub fn identity(&self, price_subtype: Option<&str>) -> Option<VariantIdentity> {
        let base = self.base_number()?;
        Some(VariantIdentity::new(
            base,
            resolve_variant_tag(self.raw, &self.attrs, price_subtype),
        ))
    }
}
