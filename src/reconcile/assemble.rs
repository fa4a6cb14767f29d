use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use super::record::CardRecord;
use super::{ReconcileReport, Reconciled};

/// Reconciled cards for one set code, ready for a sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupResult {
    pub set_code: String,
    pub group_ids: Vec<i64>,
    pub cards: BTreeMap<String, CardRecord>,
    pub report: ReconcileReport,
}

impl GroupResult {
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Fold another group of the same set into this one. Keys already present
    /// win, matching the in-group collision policy.
    pub fn merge(&mut self, other: GroupResult) {
        self.group_ids.extend(other.group_ids);
        self.report.absorb(&other.report);
        for (key, card) in other.cards {
            if self.cards.contains_key(&key) {
                self.report.duplicate_variants += 1;
                continue;
            }
            self.cards.insert(key, card);
        }
        self.report.records = self.cards.len();
    }
}

pub fn assemble(set_code: &str, group_id: i64, reconciled: Reconciled) -> GroupResult {
    let Reconciled { cards, report } = reconciled;
    info!(
        set_code,
        group_id,
        cards = cards.len(),
        skipped = report.skipped(),
        unresolved = report.unresolved_products,
        orphans = report.orphan_prices,
        duplicates = report.duplicate_variants,
        "group assembled"
    );
    GroupResult {
        set_code: set_code.to_ascii_uppercase(),
        group_ids: vec![group_id],
        cards,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawPrice, RawProduct};
    use crate::reconcile::{reconcile_group, ReconcileOptions};

    fn group(group_id: i64, rows: &[(&str, &str, &str, f64)]) -> GroupResult {
        let products: Vec<RawProduct> = rows
            .iter()
            .map(|(id, _, number, _)| RawProduct::new(*id, "card").with_extended("Number", number))
            .collect();
        let prices: Vec<RawPrice> = rows
            .iter()
            .map(|(id, subtype, _, market)| RawPrice::new(*id, subtype).with_market(*market))
            .collect();
        let reconciled =
            reconcile_group(group_id, &products, &prices, &ReconcileOptions::default());
        assemble("op01", group_id, reconciled)
    }

    #[test]
    fn assemble_uppercases_set_code_and_keeps_counts() {
        let result = group(3188, &[("1", "Normal", "OP01-001", 1.0)]);
        assert_eq!(result.set_code, "OP01");
        assert_eq!(result.group_ids, vec![3188]);
        assert_eq!(result.len(), 1);
        assert_eq!(result.report.records, 1);
    }

    #[test]
    fn merge_keeps_existing_keys() {
        let mut base = group(3188, &[("1", "Normal", "OP01-001", 1.0)]);
        let extra = group(
            4000,
            &[("9", "Normal", "OP01-001", 7.0), ("8", "Foil", "OP01-002", 2.0)],
        );
        base.merge(extra);

        assert_eq!(base.group_ids, vec![3188, 4000]);
        assert_eq!(base.len(), 2);
        assert_eq!(base.cards["OP01-001"].prices.market_price, Some(1.0));
        assert_eq!(base.cards["OP01-002_foil"].group_id, 4000);
        assert_eq!(base.report.duplicate_variants, 1);
        assert_eq!(base.report.records, 2);
    }
}
