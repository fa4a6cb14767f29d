use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Result};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use super::{CardSink, CatalogSource, GroupRegistry};
use crate::config::canonical_set_code;
use crate::reconcile::assemble::{assemble, GroupResult};
use crate::reconcile::{reconcile_group, ReconcileOptions, ReconcileReport};

#[derive(Debug, Clone, PartialEq)]
pub enum SetStatus {
    Written { path: PathBuf, records: usize },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcome {
    pub set_code: String,
    pub group_ids: Vec<i64>,
    pub status: SetStatus,
    pub report: ReconcileReport,
}

impl SetOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, SetStatus::Written { .. })
    }
}

/// Per-set outcomes in request order, plus report totals over written sets.
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub outcomes: Vec<SetOutcome>,
    pub totals: ReconcileReport,
}

impl SyncSummary {
    pub fn record(&mut self, outcome: SetOutcome) {
        if outcome.is_ok() {
            self.totals.absorb(&outcome.report);
            self.totals.records += outcome.report.records;
        }
        self.outcomes.push(outcome);
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when at least one set was requested and none was written.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded() == 0
    }
}

/// Reconcile one set across all of its groups. Any failing group fails the
/// whole set so a partial file is never written.
pub async fn reconcile_set(
    set_code: &str,
    group_ids: &[i64],
    source: &dyn CatalogSource,
    opts: &ReconcileOptions,
) -> Result<GroupResult> {
    let mut merged: Option<GroupResult> = None;
    for &group_id in group_ids {
        let (products, prices) =
            futures::try_join!(source.products(group_id), source.prices(group_id))?;
        let result = assemble(
            set_code,
            group_id,
            reconcile_group(group_id, &products, &prices, opts),
        );
        match merged.as_mut() {
            Some(acc) => acc.merge(result),
            None => merged = Some(result),
        }
    }
    merged.ok_or_else(|| anyhow!("no catalog groups for set {set_code}"))
}

async fn sync_one(
    set_code: String,
    registry: &dyn GroupRegistry,
    source: &dyn CatalogSource,
    sink: &dyn CardSink,
    opts: &ReconcileOptions,
) -> SetOutcome {
    let group_ids = registry.groups_for(&set_code);
    let started = Instant::now();
    let result = match reconcile_set(&set_code, &group_ids, source, opts).await {
        Ok(result) => sink.write_set(&result).map(|path| (path, result)),
        Err(e) => Err(e),
    };
    match result {
        Ok((path, result)) => {
            info!(
                set_code = %set_code,
                records = result.len(),
                skipped = result.report.skipped(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "set synced"
            );
            SetOutcome {
                set_code,
                group_ids,
                status: SetStatus::Written {
                    path,
                    records: result.len(),
                },
                report: result.report,
            }
        }
        Err(e) => {
            error!(set_code = %set_code, error = %format!("{e:#}"), "set failed");
            SetOutcome {
                set_code,
                group_ids,
                status: SetStatus::Failed(format!("{e:#}")),
                report: ReconcileReport::default(),
            }
        }
    }
}

/// Sync every requested set, `concurrency` sets at a time. A failing set is
/// recorded and does not stop the others; the manifest is written last.
pub async fn sync_sets(
    set_codes: &[String],
    registry: &dyn GroupRegistry,
    source: &dyn CatalogSource,
    sink: &dyn CardSink,
    opts: &ReconcileOptions,
    concurrency: usize,
) -> Result<SyncSummary> {
    let codes: Vec<String> = if set_codes.is_empty() {
        registry.set_codes()
    } else {
        let mut codes: Vec<String> = Vec::with_capacity(set_codes.len());
        for code in set_codes.iter().map(|c| canonical_set_code(c)) {
            if !code.is_empty() && !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    };
    if codes.is_empty() {
        warn!("no set codes to sync");
    }

    let mut indexed: Vec<(usize, SetOutcome)> = stream::iter(codes.into_iter().enumerate())
        .map(|(i, code)| async move { (i, sync_one(code, registry, source, sink, opts).await) })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    indexed.sort_by_key(|(i, _)| *i);

    let mut summary = SyncSummary::default();
    for (_, outcome) in indexed {
        summary.record(outcome);
    }
    sink.finish(&summary)?;
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        records = summary.totals.records,
        "sync finished"
    );
    Ok(summary)
}
