//! Price ↔ product reconciliation for a single catalog group.
//!
//! Pure and synchronous: two already-fetched listings in, one keyed card map
//! and a skip report out. Nothing here fails; malformed or unmatched rows are
//! dropped and counted.
//!
//! Collision policy: first-encountered wins, in price-list input order. A
//! later row mapping to an existing card key is dropped and counted in
//! `duplicate_variants`. Repeated product ids in the product listing keep the
//! first product.

pub mod assemble;
pub mod record;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{ProductId, RawPrice, RawProduct};
use crate::normalization::NormalizedProduct;
use record::CardRecord;

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Also emit metadata-only records for resolved products no price row touched.
    pub include_unpriced: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub products_seen: usize,
    pub prices_seen: usize,
    pub unresolved_products: usize,
    pub orphan_prices: usize,
    pub unresolved_prices: usize,
    pub duplicate_products: usize,
    pub duplicate_variants: usize,
    pub unpriced_records: usize,
    pub records: usize,
    pub unresolved_product_ids: Vec<ProductId>,
}

impl ReconcileReport {
    /// Total rows dropped for any reason.
    pub fn skipped(&self) -> usize {
        self.unresolved_products
            + self.orphan_prices
            + self.unresolved_prices
            + self.duplicate_products
            + self.duplicate_variants
    }

    pub fn absorb(&mut self, other: &ReconcileReport) {
        self.products_seen += other.products_seen;
        self.prices_seen += other.prices_seen;
        self.unresolved_products += other.unresolved_products;
        self.orphan_prices += other.orphan_prices;
        self.unresolved_prices += other.unresolved_prices;
        self.duplicate_products += other.duplicate_products;
        self.duplicate_variants += other.duplicate_variants;
        self.unpriced_records += other.unpriced_records;
        self.unresolved_product_ids
            .extend(other.unresolved_product_ids.iter().cloned());
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub cards: BTreeMap<String, CardRecord>,
    pub report: ReconcileReport,
}

pub fn reconcile_group(
    group_id: i64,
    products: &[RawProduct],
    prices: &[RawPrice],
    opts: &ReconcileOptions,
) -> Reconciled {
    let mut report = ReconcileReport {
        products_seen: products.len(),
        prices_seen: prices.len(),
        ..ReconcileReport::default()
    };

    let mut index: HashMap<&ProductId, NormalizedProduct<'_>> =
        HashMap::with_capacity(products.len());
    for product in products {
        if index.contains_key(&product.product_id) {
            report.duplicate_products += 1;
            debug!(
                group_id,
                product_id = %product.product_id,
                "duplicate product id; keeping first listing"
            );
            continue;
        }
        let normalized = NormalizedProduct::new(product);
        if normalized.base.is_none() {
            report.unresolved_products += 1;
            report.unresolved_product_ids.push(product.product_id.clone());
            warn!(
                group_id,
                product_id = %product.product_id,
                name = product.display_name(),
                "no card number on product; excluded"
            );
        }
        index.insert(&product.product_id, normalized);
    }

    let mut cards: BTreeMap<String, CardRecord> = BTreeMap::new();
    let mut priced: HashSet<&ProductId> = HashSet::new();

    for price in prices {
        let Some(product) = index.get(&price.product_id) else {
            report.orphan_prices += 1;
            debug!(group_id, product_id = %price.product_id, "price without product; dropped");
            continue;
        };
        let subtype = price.sub_type_name.as_deref().unwrap_or("");
        let Some(identity) = product.identity(Some(subtype)) else {
            report.unresolved_prices += 1;
            continue;
        };
        priced.insert(&price.product_id);

        match cards.entry(identity.key()) {
            Entry::Occupied(existing) => {
                report.duplicate_variants += 1;
                debug!(
                    group_id,
                    card_id = %existing.key(),
                    kept = %existing.get().product_id,
                    dropped = %price.product_id,
                    "variant collision; keeping first"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(CardRecord::new(
                    &identity,
                    &price.product_id,
                    group_id,
                    &product.metadata,
                    Some(price),
                ));
            }
        }
    }

    if opts.include_unpriced {
        for product in products {
            if priced.contains(&product.product_id) {
                continue;
            }
            let Some(normalized) = index.get(&product.product_id) else {
                continue;
            };
            // Only the listing that won the product-id slot.
            if !std::ptr::eq(normalized.raw, product) {
                continue;
            }
            let Some(identity) = normalized.identity(None) else {
                continue;
            };
            match cards.entry(identity.key()) {
                Entry::Occupied(_) => report.duplicate_variants += 1,
                Entry::Vacant(slot) => {
                    slot.insert(CardRecord::new(
                        &identity,
                        &product.product_id,
                        group_id,
                        &normalized.metadata,
                        None,
                    ));
                    report.unpriced_records += 1;
                }
            }
        }
    }

    report.records = cards.len();
    Reconciled { cards, report }
}
